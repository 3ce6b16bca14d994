//! Trial decryption of inbound envelope content.
//!
//! Clients do not declare which encryption scheme they used, so the bunker
//! infers it: NIP-44 is attempted first, any failure falls back to NIP-04,
//! and only when both schemes fail does the message fail. A signer missing
//! a scheme entirely just skips that attempt.

use nostr::prelude::*;

use crate::error::BunkerError;
use crate::signer::BunkerSigner;

/// Decrypt `ciphertext` from `counterparty` with whichever scheme fits.
pub async fn decrypt(
    signer: &dyn BunkerSigner,
    counterparty: &PublicKey,
    ciphertext: &str,
) -> Result<String, BunkerError> {
    if let Some(cipher) = signer.nip44() {
        if let Ok(plaintext) = cipher.decrypt(counterparty, ciphertext).await {
            return Ok(plaintext);
        }
    }
    if let Some(cipher) = signer.nip04() {
        if let Ok(plaintext) = cipher.decrypt(counterparty, ciphertext).await {
            return Ok(plaintext);
        }
    }
    Err(BunkerError::DecryptionFailed)
}
