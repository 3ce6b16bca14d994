//! Signer abstraction for the bunker.
//!
//! A [`BunkerSigner`] is one signing identity. The session holds two of
//! them: the `bunker` identity that receives and decrypts inbound traffic,
//! and the `user` identity on whose behalf requests are served. Encryption
//! schemes are optional capabilities queried through [`BunkerSigner::nip04`]
//! and [`BunkerSigner::nip44`]; a signer that lacks a scheme returns `None`
//! and the caller fails with a typed error instead of hanging.
//!
//! Local `Keys` implement the full surface. Hardware-backed or custodial
//! signers can implement the traits and advertise only what they support.

use async_trait::async_trait;
use nostr::nips::{nip04, nip44};
use nostr::prelude::*;

use crate::error::BunkerError;

/// NIP-04 (legacy) payload encryption.
#[async_trait]
pub trait Nip04Cipher: Send + Sync {
    async fn encrypt(&self, counterparty: &PublicKey, plaintext: &str) -> Result<String, BunkerError>;
    async fn decrypt(&self, counterparty: &PublicKey, ciphertext: &str) -> Result<String, BunkerError>;
}

/// NIP-44 (modern) payload encryption.
#[async_trait]
pub trait Nip44Cipher: Send + Sync {
    async fn encrypt(&self, counterparty: &PublicKey, plaintext: &str) -> Result<String, BunkerError>;
    async fn decrypt(&self, counterparty: &PublicKey, ciphertext: &str) -> Result<String, BunkerError>;
}

/// A signing identity usable by a bunker session.
#[async_trait]
pub trait BunkerSigner: Send + Sync {
    async fn public_key(&self) -> Result<PublicKey, BunkerError>;

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, BunkerError>;

    /// Relay set advertised for `get_relays`. `None` when the identity has
    /// no relay list; the session serializes that as an empty list.
    async fn relays(&self) -> Option<Vec<RelayUrl>> {
        None
    }

    /// Legacy encryption capability, if present.
    fn nip04(&self) -> Option<&dyn Nip04Cipher> {
        None
    }

    /// Modern encryption capability, if present.
    fn nip44(&self) -> Option<&dyn Nip44Cipher> {
        None
    }
}

#[async_trait]
impl Nip04Cipher for Keys {
    async fn encrypt(&self, counterparty: &PublicKey, plaintext: &str) -> Result<String, BunkerError> {
        nip04::encrypt(self.secret_key(), counterparty, plaintext)
            .map_err(|e| BunkerError::Signer(e.to_string()))
    }

    async fn decrypt(&self, counterparty: &PublicKey, ciphertext: &str) -> Result<String, BunkerError> {
        nip04::decrypt(self.secret_key(), counterparty, ciphertext)
            .map_err(|e| BunkerError::Signer(e.to_string()))
    }
}

#[async_trait]
impl Nip44Cipher for Keys {
    async fn encrypt(&self, counterparty: &PublicKey, plaintext: &str) -> Result<String, BunkerError> {
        nip44::encrypt(self.secret_key(), counterparty, plaintext, nip44::Version::V2)
            .map_err(|e| BunkerError::Signer(e.to_string()))
    }

    async fn decrypt(&self, counterparty: &PublicKey, ciphertext: &str) -> Result<String, BunkerError> {
        nip44::decrypt(self.secret_key(), counterparty, ciphertext)
            .map_err(|e| BunkerError::Signer(e.to_string()))
    }
}

#[async_trait]
impl BunkerSigner for Keys {
    async fn public_key(&self) -> Result<PublicKey, BunkerError> {
        Ok(Keys::public_key(self))
    }

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, BunkerError> {
        unsigned
            .sign_with_keys(self)
            .map_err(|e| BunkerError::Signer(e.to_string()))
    }

    fn nip04(&self) -> Option<&dyn Nip04Cipher> {
        Some(self)
    }

    fn nip44(&self) -> Option<&dyn Nip44Cipher> {
        Some(self)
    }
}
