//! Bunker daemon configuration
//!
//! Handles the JSON config file holding the bunker's key material, the
//! authorized client pubkey, and the relay set, plus generation of the
//! bunker:// pairing URI shown to clients.

use std::path::Path;

use anyhow::{Context, Result};
use nostr::prelude::*;
use serde::{Deserialize, Serialize};

/// Persistent bunker daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BunkerConfig {
    /// Secret key (hex) of the bunker identity that receives requests
    pub bunker_secret_key: String,
    /// Secret key (hex) of the user identity operations are performed as.
    /// When absent the bunker identity doubles as the user identity.
    pub user_secret_key: Option<String>,
    /// The single client pubkey (hex) allowed to issue requests
    pub authorized_pubkey: String,
    /// Relay URLs the bunker listens on
    pub relays: Vec<String>,
    /// Optional pairing token embedded in the bunker:// URI
    pub secret: Option<String>,
    /// When this config was created
    pub created_at: String,
    /// When the daemon last started listening
    pub last_started: Option<String>,
}

impl BunkerConfig {
    /// Build a fresh config, generating any key not supplied.
    pub fn create(
        authorized: &str,
        bunker_nsec: Option<&str>,
        user_nsec: Option<&str>,
        relays: Vec<String>,
        secret: Option<String>,
    ) -> Result<Self> {
        let authorized_pubkey = parse_pubkey(authorized)?;

        if relays.is_empty() {
            anyhow::bail!(
                "At least one relay is required.\n\
                 Example: bunkerd init --authorized <pubkey> --relays wss://relay.nsec.app"
            );
        }

        let bunker_keys = match bunker_nsec {
            Some(nsec) => parse_keys(nsec)?,
            None => Keys::generate(),
        };
        let user_secret_key = user_nsec
            .map(|nsec| Ok::<_, anyhow::Error>(parse_keys(nsec)?.secret_key().to_secret_hex()))
            .transpose()?;

        Ok(BunkerConfig {
            bunker_secret_key: bunker_keys.secret_key().to_secret_hex(),
            user_secret_key,
            authorized_pubkey: authorized_pubkey.to_hex(),
            relays,
            secret,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_started: None,
        })
    }

    /// Keys of the bunker identity
    pub fn bunker_keys(&self) -> Result<Keys> {
        let sk = SecretKey::from_hex(&self.bunker_secret_key)
            .context("Invalid stored bunker secret key")?;
        Ok(Keys::new(sk))
    }

    /// Keys of the user identity (falls back to the bunker identity)
    pub fn user_keys(&self) -> Result<Keys> {
        match &self.user_secret_key {
            Some(hex) => {
                let sk = SecretKey::from_hex(hex).context("Invalid stored user secret key")?;
                Ok(Keys::new(sk))
            }
            None => self.bunker_keys(),
        }
    }

    /// The one pubkey allowed to issue requests
    pub fn authorized(&self) -> Result<PublicKey> {
        PublicKey::from_hex(&self.authorized_pubkey).context("Invalid stored authorized pubkey")
    }

    /// Pairing URI clients paste into their signer settings
    pub fn bunker_uri(&self) -> Result<NostrConnectURI> {
        let remote_signer_public_key = self.bunker_keys()?.public_key();
        let relays: Vec<RelayUrl> = self
            .relays
            .iter()
            .filter_map(|r| RelayUrl::parse(r).ok())
            .collect();

        Ok(NostrConnectURI::Bunker {
            remote_signer_public_key,
            relays,
            secret: self.secret.clone(),
        })
    }

    /// Load config from disk
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).context("Failed to read bunker config")?;
        let config: BunkerConfig =
            serde_json::from_str(&content).context("Failed to parse bunker config")?;
        Ok(Some(config))
    }

    /// Save config to disk atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let tmp_path = path.with_extension("json.tmp");

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize bunker config")?;

        // Write to temp file first
        std::fs::write(&tmp_path, &content).context("Failed to write bunker config temp file")?;

        // Atomic rename
        std::fs::rename(&tmp_path, path).context("Failed to atomically save bunker config")?;

        // Set restrictive permissions (config contains secret keys)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Delete config from disk
    pub fn delete(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path).context("Failed to delete bunker config")?;
        }
        Ok(())
    }

    /// Update last_started timestamp
    pub fn update_started(&mut self) {
        self.last_started = Some(chrono::Utc::now().to_rfc3339());
    }
}

fn parse_keys(nsec: &str) -> Result<Keys> {
    if nsec.starts_with("nsec") {
        Keys::parse(nsec).context("Invalid nsec")
    } else {
        let sk = SecretKey::from_hex(nsec).context("Invalid secret key hex")?;
        Ok(Keys::new(sk))
    }
}

fn parse_pubkey(input: &str) -> Result<PublicKey> {
    if input.starts_with("npub") {
        PublicKey::from_bech32(input).context("Invalid npub")
    } else {
        PublicKey::from_hex(input).context("Invalid pubkey hex")
    }
}
