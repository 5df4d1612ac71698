//! # pngseal - Encrypted text metadata for PNG images
//!
//! pngseal reads and rewrites the `tEXt` chunks of a PNG file without touching
//! any other chunk, and protects individual text values with hybrid
//! RSA-2048 + AES-256-GCM encryption.
//!
//! ## Features
//!
//! - **Lossless chunk codec**: every non-text chunk is written back byte for
//!   byte, CRCs are recomputed on save
//! - **Hybrid encryption**: per-value AES-256-GCM session key wrapped with a
//!   persistent RSA keypair, no size limit on the text
//! - **Key lifecycle**: load-or-generate, PEM import/export, regeneration,
//!   SHA-256 fingerprints
//! - **Atomic saves**: key files and images are replaced all-or-nothing
//!
//! ## Quick Start
//!
//! ```no_run
//! use pngseal::{config::Config, document::Document, hybrid::HybridCipher, key_manager::KeyManager};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let cfg = Config::resolve(None)?;
//!     let keys = Arc::new(KeyManager::load_or_generate(&cfg)?);
//!     let mut doc = Document::open("photo.png", HybridCipher::new(keys))?;
//!
//!     doc.add_record("Comment", "meet at noon")?;
//!     doc.encrypt_record(doc.len() - 1)?;
//!     doc.save()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Envelope Format
//!
//! Encrypted text is stored as `ENC:<base64 wrapped key>:<base64 nonce+ciphertext+tag>`.

pub mod chunk;
pub mod config;
pub mod document;
pub mod error;
pub mod hybrid;
pub mod key_manager;
pub mod metadata;
pub mod pem;
pub mod symmetric;
pub mod text_chunk;
pub mod util;

// Re-export common types for convenience
pub use error::{ErrorKind, Result, SealError};
