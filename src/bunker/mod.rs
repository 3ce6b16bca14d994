//! Nostr Connect (NIP-46) bunker core.
//!
//! This module is the protocol engine: trial decryption of inbound
//! envelopes, the strict request codec, and the session state machine that
//! authorizes, dispatches, and answers remote signing requests.

pub mod decrypt;
pub mod request;
pub mod session;

pub use request::{Method, RemoteRequest, RemoteResponse};
pub use session::{Bunker, BunkerOptions, Connection, SessionState, SignerPair};
