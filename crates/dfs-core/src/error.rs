//! Error types for dfs core.

use thiserror::Error;

/// Errors produced while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("message exceeds limit: {0}")]
    LimitExceeded(&'static str),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
