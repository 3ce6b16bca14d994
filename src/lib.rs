//! bunkerd — a NIP-46 remote signing bunker for Nostr
//!
//! The bunker holds custody of a signing identity and serves signing and
//! encryption operations to a single authorized client over encrypted
//! kind-24133 events exchanged through public relays. The client never
//! sees key material, only encrypted results.
//!
//! The crate splits along its seams:
//! - [`bunker`] — the protocol engine: decryptor, request codec, and the
//!   session state machine.
//! - [`signer`] — capability-query signing abstraction; local `Keys`
//!   implement it, custodial backends can too.
//! - [`relay`] — the transport port, with a nostr-sdk adapter for
//!   production and room for in-memory ports in tests.
//! - [`config`] / [`audit`] — daemon persistence and operation auditing
//!   for the `bunkerd` binary.

pub mod audit;
pub mod bunker;
pub mod config;
pub mod error;
pub mod relay;
pub mod signer;

pub use bunker::{
    Bunker, BunkerOptions, Connection, Method, RemoteRequest, RemoteResponse, SessionState,
    SignerPair,
};
pub use error::BunkerError;
