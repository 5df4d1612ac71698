//! AES-256-GCM session cipher.
//!
//! Each message gets its own [`SessionKey`] and a fresh 96-bit nonce. The
//! sealed blob is self-describing:
//!
//! ```text
//! [nonce:12][ciphertext][tag:16]
//! ```

use crate::error::{Result, SealError};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::RngCore;
use zeroize::Zeroize;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Ephemeral 256-bit key, wiped on drop
pub struct SessionKey {
    bytes: [u8; KEY_LEN],
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl SessionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Rebuild a key from unwrapped bytes. Anything but 32 bytes means the
    /// wrapped key was not one of ours.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(SealError::crypto(format!(
                "session key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut arr = [0u8; KEY_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.bytes)
            .map_err(|e| SealError::crypto(format!("invalid session key: {}", e)))
    }
}

/// Shorthand for [`SessionKey::generate`]
pub fn generate_key() -> SessionKey {
    SessionKey::generate()
}

/// Encrypt `plaintext`, returning `nonce ++ ciphertext ++ tag`
pub fn seal(plaintext: &[u8], key: &SessionKey) -> Result<Vec<u8>> {
    let cipher = key.cipher()?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| SealError::crypto(format!("encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Verify and decrypt a blob produced by [`seal`]
pub fn open(sealed: &[u8], key: &SessionKey) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(SealError::crypto(format!(
            "sealed payload too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = key.cipher()?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SealError::crypto("authentication failed: wrong key or tampered data"))
}
