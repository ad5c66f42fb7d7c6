//! Connection handshakes.
//!
//! A handshake runs once per connection, before the read loop starts and
//! before the application hears about the peer. An error drops the
//! connection.

use async_trait::async_trait;

use crate::error::{Result, TransportError};
use crate::peer::Peer;

/// Magic bytes opening a [`VersionHandshake`].
pub const HANDSHAKE_MAGIC: [u8; 4] = *b"DFS1";

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// A check both sides run on a fresh connection.
#[async_trait]
pub trait Handshake: Send + Sync {
    /// Run the handshake on `peer`. Returning an error drops the connection.
    async fn handshake(&self, peer: &Peer) -> Result<()>;
}

/// Accepts every connection without exchanging anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandshake;

#[async_trait]
impl Handshake for NopHandshake {
    async fn handshake(&self, _peer: &Peer) -> Result<()> {
        Ok(())
    }
}

/// Exchanges magic bytes and a protocol version.
///
/// Each side writes `MAGIC | version` and reads the other's. Both writes go
/// out before either read, so the exchange cannot deadlock.
#[derive(Debug, Clone, Copy)]
pub struct VersionHandshake {
    /// Version this side speaks.
    pub version: u8,
}

impl Default for VersionHandshake {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
        }
    }
}

#[async_trait]
impl Handshake for VersionHandshake {
    async fn handshake(&self, peer: &Peer) -> Result<()> {
        let mut hello = [0u8; 5];
        hello[..4].copy_from_slice(&HANDSHAKE_MAGIC);
        hello[4] = self.version;
        peer.send(&hello).await?;

        let mut reply = [0u8; 5];
        peer.recv_exact(&mut reply).await?;

        if reply[..4] != HANDSHAKE_MAGIC {
            return Err(TransportError::HandshakeFailed(format!(
                "bad magic from {}",
                peer.addr()
            )));
        }
        if reply[4] != self.version {
            return Err(TransportError::VersionMismatch {
                local: self.version,
                peer: reply[4],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn pair() -> (Peer, Peer) {
        let (a, b) = duplex(64);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (
            Peer::new("b", true, Box::new(ar), Box::new(aw)),
            Peer::new("a", false, Box::new(br), Box::new(bw)),
        )
    }

    #[tokio::test]
    async fn test_matching_versions() {
        let (a, b) = pair();
        let hs = VersionHandshake::default();
        let (ra, rb) = tokio::join!(hs.handshake(&a), hs.handshake(&b));
        ra.unwrap();
        rb.unwrap();
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let (a, b) = pair();
        let (ra, rb) = tokio::join!(
            VersionHandshake { version: 1 }.handshake(&a),
            VersionHandshake { version: 2 }.handshake(&b)
        );
        assert!(matches!(
            ra,
            Err(TransportError::VersionMismatch { local: 1, peer: 2 })
        ));
        assert!(matches!(
            rb,
            Err(TransportError::VersionMismatch { local: 2, peer: 1 })
        ));
    }

    #[tokio::test]
    async fn test_bad_magic() {
        let (a, b) = pair();
        let hs = VersionHandshake::default();
        let (ra, rb) = tokio::join!(
            hs.handshake(&a),
            b.send(b"HTTP/")
        );
        rb.unwrap();
        assert!(matches!(ra, Err(TransportError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn test_nop_handshake_sends_nothing() {
        let (a, b) = pair();
        NopHandshake.handshake(&a).await.unwrap();
        a.close().await;

        let mut buf = [0u8; 1];
        assert!(b.recv_exact(&mut buf).await.is_err());
    }
}
