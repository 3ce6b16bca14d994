// bunkerd - NIP-46 remote signing bunker over Nostr
//
// Holds custody of a Nostr identity and serves sign/encrypt/decrypt
// requests from a single authorized client, exchanged as encrypted
// kind-24133 events over public relays. The client never sees the keys.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nostr::prelude::*;
use tokio::sync::Mutex;

use bunkerd::audit::AuditLog;
use bunkerd::bunker::{Bunker, BunkerOptions, Connection, SignerPair};
use bunkerd::config::BunkerConfig;
use bunkerd::relay::ClientRelay;

#[derive(Parser)]
#[command(name = "bunkerd")]
#[command(about = "NIP-46 remote signing bunker for Nostr")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(
        short,
        long,
        default_value = "~/.bunkerd/bunker.json",
        env = "BUNKERD_CONFIG"
    )]
    config: String,

    /// Suppress relay connection logs
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a bunker identity and authorize a client pubkey
    Init {
        /// Client pubkey (hex or npub) allowed to issue requests
        #[arg(long)]
        authorized: String,
        /// Existing bunker secret key (otherwise a fresh one is generated)
        #[arg(long, env = "BUNKER_NSEC", hide_env_values = true)]
        nsec: Option<String>,
        /// Separate user identity to operate as (defaults to the bunker key)
        #[arg(long, env = "BUNKER_USER_NSEC", hide_env_values = true)]
        user_nsec: Option<String>,
        /// Relay URLs (comma-separated)
        #[arg(short, long, default_value = "wss://relay.nsec.app")]
        relays: String,
        /// Pairing token embedded in the bunker:// URI
        #[arg(long)]
        secret: Option<String>,
    },
    /// Run the bunker until interrupted
    Run,
    /// Show identity, authorization, and audit status
    Status,
    /// Print the bunker:// pairing URI
    Uri,
}

fn init(
    path: &Path,
    authorized: &str,
    nsec: Option<&str>,
    user_nsec: Option<&str>,
    relays: &str,
    secret: Option<String>,
) -> Result<()> {
    if BunkerConfig::load(path)?.is_some() {
        anyhow::bail!(
            "A bunker configuration already exists.\n\
             Delete it first with: rm {}",
            path.display()
        );
    }

    let relay_urls: Vec<String> = relays.split(',').map(|s| s.trim().to_string()).collect();
    let config = BunkerConfig::create(authorized, nsec, user_nsec, relay_urls, secret)?;
    config.save(path)?;

    println!("✓ Bunker configured!");
    println!(
        "  Bunker identity: {}",
        config.bunker_keys()?.public_key().to_bech32()?
    );
    println!(
        "  User identity:   {}",
        config.user_keys()?.public_key().to_bech32()?
    );
    println!("  Authorized client: {}", config.authorized_pubkey);
    println!("  Config: {}", path.display());
    println!("\nPairing URI (paste into the client):");
    println!("  {}", config.bunker_uri()?);
    println!("\nNext: bunkerd run");
    Ok(())
}

async fn run(path: &Path) -> Result<()> {
    let mut config = BunkerConfig::load(path)?
        .context("No bunker config found. Run `bunkerd init --authorized <pubkey>` first.")?;

    let bunker_keys = config.bunker_keys()?;
    let user_keys = config.user_keys()?;
    let authorized_pubkey = config.authorized()?;
    let uri = config.bunker_uri()?;

    eprintln!("🔐 Connecting to {} relay(s)...", config.relays.len());
    let relay = Arc::new(
        ClientRelay::connect(&config.relays)
            .await
            .context("Failed to connect to relays")?,
    );

    let audit = Arc::new(Mutex::new(AuditLog::new(path)));
    let connection = Connection {
        authorized_pubkey,
        signers: SignerPair {
            user: Arc::new(user_keys),
            bunker: Arc::new(bunker_keys),
        },
    };

    let bunker = Bunker::open(BunkerOptions {
        relay,
        connection: Some(connection),
        audit,
        on_subscribed: Box::new(move || {
            println!("✓ Bunker listening");
            println!("  Pairing URI: {uri}");
            println!("  Press Ctrl+C to stop");
        }),
    })
    .await
    .context("Failed to open bunker session")?;

    config.update_started();
    config.save(path)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("received Ctrl+C, shutting down...");
    bunker.shutdown().await;
    Ok(())
}

fn show_status(path: &Path) -> Result<()> {
    println!("=== bunkerd status ===\n");

    let Some(config) = BunkerConfig::load(path)? else {
        println!("❌ No bunker configured.");
        println!("   Run: bunkerd init --authorized <pubkey>");
        return Ok(());
    };

    println!(
        "Bunker identity: {}",
        config.bunker_keys()?.public_key().to_bech32()?
    );
    println!(
        "User identity:   {}",
        config.user_keys()?.public_key().to_bech32()?
    );
    println!("Authorized client: {}", config.authorized_pubkey);
    println!("Relays: {}", config.relays.join(", "));
    println!("Created: {}", config.created_at);
    if let Some(last) = &config.last_started {
        println!("Last started: {last}");
    }
    println!("Config file: {}", path.display());

    let audit_path = path.with_extension("audit.jsonl");
    if audit_path.exists() {
        if let Ok(metadata) = std::fs::metadata(&audit_path) {
            println!(
                "\nAudit log: {} ({} bytes)",
                audit_path.display(),
                metadata.len()
            );
        }
    }

    Ok(())
}

fn show_uri(path: &Path) -> Result<()> {
    let config = BunkerConfig::load(path)?
        .context("No bunker config found. Run `bunkerd init --authorized <pubkey>` first.")?;
    println!("{}", config.bunker_uri()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let default_filter = if cli.quiet {
        "warn,nostr_relay_pool=off"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = PathBuf::from(
        cli.config
            .replace('~', &std::env::var("HOME").unwrap_or_default()),
    );

    match cli.command {
        Commands::Init {
            authorized,
            nsec,
            user_nsec,
            relays,
            secret,
        } => init(
            &config_path,
            &authorized,
            nsec.as_deref(),
            user_nsec.as_deref(),
            &relays,
            secret,
        ),
        Commands::Run => run(&config_path).await,
        Commands::Status => show_status(&config_path),
        Commands::Uri => show_uri(&config_path),
    }
}
