//! Request/response codec for the Connect protocol.
//!
//! Payloads travel as JSON inside encrypted kind-24133 event content.
//! Parsing is strict about the required fields (`id`, `method`) and their
//! types; unknown extra fields are tolerated. A parse failure condemns one
//! message, never the session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BunkerError;

/// The closed set of methods a bunker serves. Anything else lands on
/// [`Method::Unknown`] and is answered with an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    SignEvent,
    Ping,
    GetRelays,
    GetPublicKey,
    Nip04Encrypt,
    Nip04Decrypt,
    Nip44Encrypt,
    Nip44Decrypt,
    Unknown(String),
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        match name {
            "sign_event" => Method::SignEvent,
            "ping" => Method::Ping,
            "get_relays" => Method::GetRelays,
            "get_public_key" => Method::GetPublicKey,
            "nip04_encrypt" => Method::Nip04Encrypt,
            "nip04_decrypt" => Method::Nip04Decrypt,
            "nip44_encrypt" => Method::Nip44Encrypt,
            "nip44_decrypt" => Method::Nip44Decrypt,
            other => Method::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::SignEvent => "sign_event",
            Method::Ping => "ping",
            Method::GetRelays => "get_relays",
            Method::GetPublicKey => "get_public_key",
            Method::Nip04Encrypt => "nip04_encrypt",
            Method::Nip04Decrypt => "nip04_decrypt",
            Method::Nip44Encrypt => "nip44_encrypt",
            Method::Nip44Decrypt => "nip44_decrypt",
            Method::Unknown(other) => other,
        };
        f.write_str(name)
    }
}

/// A remote procedure call decrypted from an envelope event.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl RemoteRequest {
    /// Parse decrypted plaintext. Missing `id`/`method` or wrong field
    /// types are a hard failure for this message.
    pub fn parse(plaintext: &str) -> Result<Self, BunkerError> {
        serde_json::from_str(plaintext).map_err(|e| BunkerError::MalformedRequest(e.to_string()))
    }

    pub fn method(&self) -> Method {
        Method::from(self.method.as_str())
    }

    /// Positional param accessor; absence is a malformed request.
    pub fn param(&self, index: usize) -> Result<&str, BunkerError> {
        self.params
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| BunkerError::MalformedRequest(format!("missing param {index}")))
    }
}

/// Reply to a [`RemoteRequest`]. `result` is always present on the wire,
/// empty when the call failed; `error` is only serialized when populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub id: String,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteResponse {
    pub fn ok(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: result.into(),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: String::new(),
            error: Some(error.into()),
        }
    }
}
