//! TCP transport.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::conn::{shutdown_requested, Connections};
use crate::error::{Result, TransportError};
use crate::frame::DEFAULT_MAX_FRAME_LEN;
use crate::handshake::{Handshake, NopHandshake};
use crate::peer::Peer;
use crate::rpc::Rpc;
use crate::transport::{PeerHandler, Transport};

/// Configuration for [`TcpTransport`].
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Address to bind, e.g. `"127.0.0.1:3000"`. Port 0 picks a free port.
    pub listen_addr: String,
    /// Largest MESSAGE payload accepted from a peer.
    pub max_frame_len: usize,
    /// Capacity of the inbound message queue.
    pub inbound_capacity: usize,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".into(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            inbound_capacity: 1024,
        }
    }
}

/// Transport over TCP sockets.
pub struct TcpTransport {
    config: TcpTransportConfig,
    local_addr: Mutex<Option<SocketAddr>>,
    connections: Arc<Connections>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Create a transport without a handshake.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self::with_handshake(config, Arc::new(NopHandshake))
    }

    /// Create a transport that runs `handshake` on every connection.
    pub fn with_handshake(config: TcpTransportConfig, handshake: Arc<dyn Handshake>) -> Self {
        let connections =
            Connections::new(handshake, config.max_frame_len, config.inbound_capacity);
        Self {
            config,
            local_addr: Mutex::new(None),
            connections,
            accept_task: Mutex::new(None),
        }
    }

    /// The bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn peer_from_stream(stream: TcpStream, remote: SocketAddr, outbound: bool) -> Peer {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(peer = %remote, error = %e, "failed to set TCP_NODELAY");
    }
    let (reader, writer) = stream.into_split();
    Peer::new(remote.to_string(), outbound, Box::new(reader), Box::new(writer))
}

#[async_trait]
impl Transport for TcpTransport {
    fn addr(&self) -> String {
        match self.local_addr() {
            Some(addr) => addr.to_string(),
            None => self.config.listen_addr.clone(),
        }
    }

    async fn listen(&self) -> Result<()> {
        if self.connections.is_shut_down() {
            return Err(TransportError::Closed);
        }

        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        let bound = listener.local_addr()?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(bound);
        tracing::info!(addr = %bound, "listening");

        let connections = Arc::clone(&self.connections);
        let mut shutdown = connections.shutdown_signal();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, remote)) => {
                            connections.spawn(peer_from_stream(stream, remote, false));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    },
                }
            }
            tracing::debug!(addr = %bound, "stopped accepting");
        });

        *self.accept_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    async fn dial(&self, addr: &str) -> Result<()> {
        if self.connections.is_shut_down() {
            return Err(TransportError::Closed);
        }

        let stream = TcpStream::connect(addr).await?;
        let remote = stream.peer_addr()?;
        self.connections.spawn(peer_from_stream(stream, remote, true));
        Ok(())
    }

    async fn recv(&self) -> Result<Rpc> {
        self.connections.recv().await
    }

    async fn close(&self) -> Result<()> {
        self.connections.shutdown().await;

        let task = self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
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
