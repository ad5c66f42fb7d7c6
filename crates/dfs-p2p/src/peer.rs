//! A connected remote node.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::sync::{watch, Mutex, MutexGuard};

use crate::error::{Result, TransportError};
use crate::frame;
use crate::gate::{PeerMode, StreamGate};
use crate::rpc::Rpc;

/// Read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One end of a connection, shared between the transport's read loop and
/// the application.
///
/// Writes are serialized by an internal lock. Hold [`Peer::writer`] across
/// a multi-part unit (a STREAM marker plus its bytes) so no other write can
/// interleave with it.
pub struct Peer {
    addr: String,
    outbound: bool,
    reader: Mutex<BufReader<BoxedReader>>,
    writer: Mutex<BoxedWriter>,
    gate: StreamGate,
    closed: watch::Sender<bool>,
}

impl Peer {
    /// Wrap a split connection.
    pub fn new(
        addr: impl Into<String>,
        outbound: bool,
        reader: BoxedReader,
        writer: BoxedWriter,
    ) -> Self {
        Self {
            addr: addr.into(),
            outbound,
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            gate: StreamGate::new(),
            closed: watch::channel(false).0,
        }
    }

    /// Remote address as seen from this side.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether we dialed this peer (as opposed to accepting it).
    pub fn is_outbound(&self) -> bool {
        self.outbound
    }

    /// The connection's stream gate.
    pub fn gate(&self) -> &StreamGate {
        &self.gate
    }

    /// Write raw bytes and flush.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Write one MESSAGE frame.
    pub async fn send_message(&self, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        frame::write_message(&mut *writer, payload).await
    }

    /// Exclusive access to the write half until the guard is dropped.
    pub async fn writer(&self) -> MutexGuard<'_, BoxedWriter> {
        self.writer.lock().await
    }

    /// Read exactly `buf.len()` bytes, bypassing the decoder.
    ///
    /// Only meaningful before the read loop starts, i.e. during a handshake.
    pub async fn recv_exact(&self, buf: &mut [u8]) -> Result<()> {
        let mut reader = self.reader.lock().await;
        reader.read_exact(buf).await?;
        Ok(())
    }

    /// Wait for the read loop to park on a STREAM marker, then take the
    /// inbound bytes.
    ///
    /// The returned [`RawStream`] reads straight off the connection. The
    /// caller must consume exactly the number of bytes the sender announced;
    /// dropping the stream hands the connection back to the decoder.
    pub async fn await_stream(&self, timeout: Duration) -> Result<RawStream<'_>> {
        let acquire = async {
            loop {
                self.gate.wait_for(PeerMode::AwaitingRawBytes).await;
                let reader = self.reader.lock().await;
                // Another consumer may have taken and finished this stream
                // while we waited for the lock.
                if self.gate.mode() == PeerMode::AwaitingRawBytes {
                    return RawStream {
                        reader,
                        gate: &self.gate,
                    };
                }
            }
        };

        tokio::time::timeout(timeout, acquire)
            .await
            .map_err(|_| TransportError::StreamTimeout(self.addr.clone()))
    }

    /// Decode the next unit. Used by the transport's read loop.
    pub(crate) async fn read_rpc(&self, max_len: usize) -> Result<Option<Rpc>> {
        let mut reader = self.reader.lock().await;
        frame::read_rpc(&mut *reader, &self.addr, max_len).await
    }

    /// Whether [`Peer::close`] has been called on this side.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`Peer::close`] has been called. Lets the read loop
    /// drop a connection the application gave up on.
    pub(crate) async fn wait_closed(&self) {
        let mut rx = self.closed.subscribe();
        loop {
            let closed = *rx.borrow_and_update();
            if closed {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Shut down the write half. The remote side sees end of stream and
    /// the local read loop stops.
    pub async fn close(&self) {
        self.closed.send_replace(true);
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(peer = %self.addr, error = %e, "shutdown failed");
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("addr", &self.addr)
            .field("outbound", &self.outbound)
            .field("mode", &self.gate.mode())
            .finish_non_exhaustive()
    }
}

/// Raw inbound bytes following a STREAM marker.
///
/// Holds the connection's read half; the read loop stays parked until this
/// is dropped.
pub struct RawStream<'a> {
    reader: MutexGuard<'a, BufReader<BoxedReader>>,
    gate: &'a StreamGate,
}

impl AsyncRead for RawStream<'_> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.reader).poll_read(cx, buf)
    }
}

impl Drop for RawStream<'_> {
    fn drop(&mut self) {
        self.gate.close();
    }
}
