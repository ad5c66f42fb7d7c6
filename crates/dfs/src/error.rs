//! Error types for the file server.

use dfs_core::CoreError;
use dfs_crypto::CryptoError;
use dfs_p2p::TransportError;
use dfs_store::StoreError;
use thiserror::Error;

/// Errors that can occur during file server operations.
#[derive(Debug, Error)]
pub enum FileServerError {
    /// Local storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Peer transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Message encoding or decoding error.
    #[error("protocol error: {0}")]
    Core(#[from] CoreError),

    /// Stream cipher error.
    #[error("cipher error: {0}")]
    Crypto(#[from] CryptoError),

    /// I/O error on a source or peer stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither the local store nor any peer has the key.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A message arrived from a peer that is no longer registered.
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    /// A stream carried fewer bytes than announced, in either direction.
    #[error("short stream for {key}: announced {expected} bytes, got {actual}")]
    ShortStream {
        key: String,
        expected: u64,
        actual: u64,
    },
}

/// Result type for file server operations.
pub type Result<T> = std::result::Result<T, FileServerError>;
