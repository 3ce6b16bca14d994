//! Error types for the bunker core.
//!
//! Every per-message failure maps to one of these kinds; none of them may
//! terminate the session loop. Only explicit cancellation stops a session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BunkerError {
    /// Neither NIP-44 nor NIP-04 could decrypt the payload.
    #[error("decryption failed under both NIP-44 and NIP-04")]
    DecryptionFailed,

    /// The decrypted payload is not a valid request.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The event author is not the authorized client pubkey. The message is
    /// dropped without any response on the wire.
    #[error("request author is not the authorized pubkey")]
    Unauthorized,

    /// The request named a method outside the Connect protocol table.
    #[error("unrecognized method: {0}")]
    UnsupportedMethod(String),

    /// The user signer does not expose the capability the request needs.
    #[error("signer does not support {0}")]
    CapabilityUnavailable(&'static str),

    /// No user signer is attached, so the response cannot be built. The
    /// response step becomes a silent no-op.
    #[error("no user signer attached, response dropped")]
    ResponseUndeliverable,

    /// A signing or encryption backend failed.
    #[error("signer error: {0}")]
    Signer(String),

    /// The relay port failed to subscribe or publish.
    #[error("relay error: {0}")]
    Relay(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
