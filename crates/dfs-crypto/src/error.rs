//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur while encrypting or decrypting a stream.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The source ended before a full IV could be read.
    #[error("short IV: expected {expected} bytes")]
    ShortIv { expected: usize },

    /// The cipher could not be constructed.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// I/O error on the source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
