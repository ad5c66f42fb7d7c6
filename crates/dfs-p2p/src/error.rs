//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur on a peer connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure (refused, reset, broken pipe).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The first byte of a unit was neither MESSAGE nor STREAM.
    #[error("unknown frame discriminant: {0:#04x}")]
    UnknownFrame(u8),

    /// A MESSAGE frame announced more bytes than allowed.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The handshake rejected the connection.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Protocol version mismatch with peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// The peer callback refused the connection.
    #[error("peer rejected: {0}")]
    PeerRejected(String),

    /// No raw stream arrived from the peer in time.
    #[error("timed out waiting for stream from {0}")]
    StreamTimeout(String),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
