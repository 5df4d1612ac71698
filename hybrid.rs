//! Hybrid RSA + AES-GCM text encryption.
//!
//! ## Envelope format
//!
//! ```text
//! ENC:<base64(wrapped session key)>:<base64(nonce ++ ciphertext ++ tag)>
//! ```
//!
//! Every call to [`HybridCipher::encrypt`] uses a new AES-256 session key,
//! which is wrapped with the RSA public key. The text itself never goes
//! through RSA, so its length is unbounded.

use crate::error::{Result, SealError};
use crate::key_manager::KeyManager;
use crate::symmetric::{self, SessionKey};
use crate::text_chunk::TextRecord;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::Arc;
use tracing::debug;

/// Marker that starts every envelope
pub const ENVELOPE_PREFIX: &str = "ENC:";

/// Separates the wrapped key from the sealed payload
pub const ENVELOPE_DELIMITER: char = ':';

/// Whether `text` is an envelope. Only the prefix is checked.
pub fn is_envelope(text: &str) -> bool {
    text.starts_with(ENVELOPE_PREFIX)
}

/// Split an envelope into its two base64 segments
fn split_envelope(envelope: &str) -> Result<(&str, &str)> {
    let body = envelope
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or_else(|| SealError::validation("text is not encrypted (missing ENC: prefix)"))?;
    body.split_once(ENVELOPE_DELIMITER)
        .ok_or_else(|| SealError::validation("invalid envelope: missing key/payload delimiter"))
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(segment)
        .map_err(|e| SealError::format(format!("invalid base64 in envelope {}: {}", what, e)))
}

/// Encrypts and decrypts text with the shared keypair
#[derive(Clone)]
pub struct HybridCipher {
    keys: Arc<KeyManager>,
}

impl HybridCipher {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    pub fn encrypt(&self, text: &str) -> Result<String> {
        let session_key = symmetric::generate_key();
        let sealed = symmetric::seal(text.as_bytes(), &session_key)?;
        let wrapped = self.keys.wrap(session_key.as_bytes())?;

        debug!(
            plaintext_len = text.len(),
            sealed_len = sealed.len(),
            "text encrypted"
        );
        Ok(format!(
            "{}{}{}{}",
            ENVELOPE_PREFIX,
            BASE64.encode(wrapped),
            ENVELOPE_DELIMITER,
            BASE64.encode(sealed)
        ))
    }

    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        let (key_b64, payload_b64) = split_envelope(envelope)?;
        let wrapped = decode_segment(key_b64, "key")?;
        let sealed = decode_segment(payload_b64, "payload")?;

        let key_bytes = self.keys.unwrap(&wrapped)?;
        let session_key = SessionKey::from_bytes(&key_bytes)?;
        let plaintext = symmetric::open(&sealed, &session_key)?;

        debug!(plaintext_len = plaintext.len(), "text decrypted");
        String::from_utf8(plaintext)
            .map_err(|_| SealError::crypto("decrypted payload is not valid UTF-8"))
    }

    /// Encrypted copy of `record`. Already-encrypted records are rejected so
    /// an envelope is never wrapped twice.
    pub fn encrypt_record(&self, record: &TextRecord) -> Result<TextRecord> {
        if record.is_encrypted() {
            return Err(SealError::validation(format!(
                "record '{}' is already encrypted",
                record.keyword()
            )));
        }
        let mut out = record.clone();
        out.set_text(self.encrypt(record.text())?);
        Ok(out)
    }

    /// Decrypted copy of `record`
    pub fn decrypt_record(&self, record: &TextRecord) -> Result<TextRecord> {
        let mut out = record.clone();
        out.set_text(self.decrypt(record.text())?);
        Ok(out)
    }
}
