//! Decoded protocol units.

use bytes::Bytes;

/// One unit decoded from a peer connection.
///
/// MESSAGE units carry their payload. STREAM units carry nothing: they tell
/// the receiver that raw bytes follow and framing must pause until someone
/// consumes them. Only MESSAGE units reach the transport's inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    /// Remote address of the sending peer.
    pub from: String,
    /// Encoded message (empty for stream markers).
    pub payload: Bytes,
    /// Whether this is a stream marker.
    pub stream: bool,
}

impl Rpc {
    /// A MESSAGE unit.
    pub fn message(from: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            from: from.into(),
            payload: payload.into(),
            stream: false,
        }
    }

    /// A STREAM marker.
    pub fn stream_marker(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            payload: Bytes::new(),
            stream: true,
        }
    }
}
