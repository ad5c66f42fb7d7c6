//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No file is stored under this key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Decrypting an incoming stream failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] dfs_crypto::CryptoError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
