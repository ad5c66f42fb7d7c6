//! Transport abstraction.
//!
//! A transport owns the listening side, dials remote nodes, runs one task
//! per connection and exposes every decoded MESSAGE through [`Transport::recv`].
//! The application learns about connections through a [`PeerHandler`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::peer::Peer;
use crate::rpc::Rpc;

/// Callbacks for connection lifecycle events.
pub trait PeerHandler: Send + Sync {
    /// A connection completed its handshake. Returning an error drops it.
    fn on_peer(&self, peer: Arc<Peer>) -> Result<()>;

    /// A connection accepted by [`PeerHandler::on_peer`] has ended.
    fn on_disconnect(&self, _peer: &Peer) {}
}

/// Transport trait for connecting peers and receiving their messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Local address: the bound address once listening, the configured one
    /// before.
    fn addr(&self) -> String;

    /// Start accepting connections in the background.
    async fn listen(&self) -> Result<()>;

    /// Connect to `addr`. The connection runs in the background.
    async fn dial(&self, addr: &str) -> Result<()>;

    /// Receive the next MESSAGE from any peer.
    ///
    /// Blocks until a message is available. Fails once the transport is
    /// closed and the queue is drained.
    async fn recv(&self) -> Result<Rpc>;

    /// Stop accepting, stop every connection task and wait for them.
    async fn close(&self) -> Result<()>;

    /// Install the lifecycle callbacks. Call before [`Transport::listen`].
    fn set_peer_handler(&self, handler: Arc<dyn PeerHandler>);
}

/// An in-process transport for testing.
///
/// Connections are `tokio::io::duplex` pipes, so every byte goes through
/// the same framing and read loop as TCP.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    use tokio::io::DuplexStream;
    use tokio::sync::{mpsc, RwLock};
    use tokio::task::JoinHandle;

    use crate::conn::{shutdown_requested, Connections};
    use crate::error::TransportError;
    use crate::frame::DEFAULT_MAX_FRAME_LEN;
    use crate::handshake::{Handshake, NopHandshake};

    /// Buffer size of each in-memory pipe.
    pub const PIPE_CAPACITY: usize = 64 * 1024;

    type Incoming = (String, DuplexStream);

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Accept queues of listening transports.
        listeners: RwLock<HashMap<String, mpsc::Sender<Incoming>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Create a transport on this network.
        pub fn create_transport(self: &Arc<Self>, addr: impl Into<String>) -> MemoryTransport {
            self.create_transport_with(addr, Arc::new(NopHandshake))
        }

        /// Create a transport that runs `handshake` on every connection.
        pub fn create_transport_with(
            self: &Arc<Self>,
            addr: impl Into<String>,
            handshake: Arc<dyn Handshake>,
        ) -> MemoryTransport {
            MemoryTransport {
                addr: addr.into(),
                network: Arc::clone(self),
                connections: Connections::new(handshake, DEFAULT_MAX_FRAME_LEN, 1024),
                accept_task: std::sync::Mutex::new(None),
            }
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                listeners: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        addr: String,
        network: Arc<MemoryNetwork>,
        connections: Arc<Connections>,
        accept_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    }

    fn peer_from_pipe(addr: String, outbound: bool, pipe: DuplexStream) -> Peer {
        let (reader, writer) = tokio::io::split(pipe);
        Peer::new(addr, outbound, Box::new(reader), Box::new(writer))
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        fn addr(&self) -> String {
            self.addr.clone()
        }

        async fn listen(&self) -> Result<()> {
            if self.connections.is_shut_down() {
                return Err(TransportError::Closed);
            }

            let (tx, mut rx) = mpsc::channel::<Incoming>(64);
            {
                let mut listeners = self.network.listeners.write().await;
                if listeners.contains_key(&self.addr) {
                    return Err(io::Error::new(io::ErrorKind::AddrInUse, self.addr.clone()).into());
                }
                listeners.insert(self.addr.clone(), tx);
            }

            let connections = Arc::clone(&self.connections);
            let mut shutdown = connections.shutdown_signal();
            let task = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => break,
                        incoming = rx.recv() => match incoming {
                            Some((remote, pipe)) => {
                                connections.spawn(peer_from_pipe(remote, false, pipe));
                            }
                            None => break,
                        },
                    }
                }
            });

            let mut slot = self
                .accept_task
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *slot = Some(task);
            Ok(())
        }

        async fn dial(&self, addr: &str) -> Result<()> {
            if self.connections.is_shut_down() {
                return Err(TransportError::Closed);
            }

            let listener = self.network.listeners.read().await.get(addr).cloned();
            let refused = || io::Error::new(io::ErrorKind::ConnectionRefused, addr.to_string());
            let listener = listener.ok_or_else(refused)?;

            let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
            listener
                .send((self.addr.clone(), remote))
                .await
                .map_err(|_| refused())?;

            self.connections
                .spawn(peer_from_pipe(addr.to_string(), true, local));
            Ok(())
        }

        async fn recv(&self) -> Result<Rpc> {
            self.connections.recv().await
        }

        async fn close(&self) -> Result<()> {
            self.network.listeners.write().await.remove(&self.addr);
            self.connections.shutdown().await;

            let task = self
                .accept_task
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            if let Some(task) = task {
                let _ = task.await;
            }
            Ok(())
        }

        fn set_peer_handler(&self, handler: Arc<dyn PeerHandler>) {
            self.connections.set_handler(handler);
        }
    }
}
