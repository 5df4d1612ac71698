use thiserror::Error;

/// Error categories for pngseal operations
#[derive(Debug, Error)]
pub enum SealError {
    /// Malformed chunk stream, bad signature, malformed envelope or PEM
    #[error("Format error: {0}")]
    Format(String),

    /// Authentication failures, key mismatch, cipher failures
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Bad input at the API boundary (oversized session key, empty keyword, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// File read/write/permission failures
    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse category of a [`SealError`], for callers that branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Crypto,
    Validation,
    Io,
}

impl SealError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, SealError>;
