//! Connection lifecycle shared by every transport.
//!
//! Each connection runs in its own task:
//!
//! ```text
//! handshake -> on_peer -> read loop -> on_disconnect -> close
//! ```
//!
//! The read loop decodes units, forwards MESSAGE units to the inbound
//! queue and parks on the stream gate after a STREAM marker.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Result, TransportError};
use crate::gate::PeerMode;
use crate::handshake::Handshake;
use crate::peer::Peer;
use crate::rpc::Rpc;
use crate::transport::PeerHandler;

/// How long [`Connections::shutdown`] waits for tasks before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub(crate) struct Connections {
    handshake: Arc<dyn Handshake>,
    handler: RwLock<Option<Arc<dyn PeerHandler>>>,
    inbound: mpsc::Sender<Rpc>,
    queue: tokio::sync::Mutex<mpsc::Receiver<Rpc>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    max_frame_len: usize,
}

impl Connections {
    pub(crate) fn new(
        handshake: Arc<dyn Handshake>,
        max_frame_len: usize,
        inbound_capacity: usize,
    ) -> Arc<Self> {
        let (inbound, queue) = mpsc::channel(inbound_capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            handshake,
            handler: RwLock::new(None),
            inbound,
            queue: tokio::sync::Mutex::new(queue),
            shutdown,
            tasks: Mutex::new(Vec::new()),
            max_frame_len,
        })
    }

    pub(crate) fn set_handler(&self, handler: Arc<dyn PeerHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn handler(&self) -> Option<Arc<dyn PeerHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Next queued MESSAGE. Fails once shut down and drained.
    pub(crate) async fn recv(&self) -> Result<Rpc> {
        let mut queue = self.queue.lock().await;
        let mut shutdown = self.shutdown_signal();
        tokio::select! {
            biased;
            rpc = queue.recv() => rpc.ok_or(TransportError::Closed),
            _ = shutdown_requested(&mut shutdown) => {
                queue.try_recv().map_err(|_| TransportError::Closed)
            }
        }
    }

    /// Run the connection lifecycle for `peer` in a new task.
    pub(crate) fn spawn(self: &Arc<Self>, peer: Peer) {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.handle(Arc::new(peer)).await });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Signal every connection task to stop and wait for them.
    pub(crate) async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for mut task in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                tracing::warn!("connection task did not stop in time, aborting");
                task.abort();
            }
        }
    }

    async fn handle(self: Arc<Self>, peer: Arc<Peer>) {
        let mut shutdown = self.shutdown_signal();

        let handshake = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => return,
            result = self.handshake.handshake(&peer) => result,
        };
        if let Err(e) = handshake {
            tracing::warn!(peer = %peer.addr(), error = %e, "handshake failed, dropping connection");
            peer.close().await;
            return;
        }

        let handler = self.handler();
        if let Some(handler) = &handler {
            if let Err(e) = handler.on_peer(Arc::clone(&peer)) {
                tracing::warn!(peer = %peer.addr(), error = %e, "peer rejected");
                peer.close().await;
                return;
            }
        }
        tracing::debug!(peer = %peer.addr(), outbound = peer.is_outbound(), "peer connected");

        match self.read_loop(&peer, &mut shutdown).await {
            Ok(()) => tracing::debug!(peer = %peer.addr(), "peer disconnected"),
            Err(e) => tracing::warn!(peer = %peer.addr(), error = %e, "dropping peer connection"),
        }

        if let Some(handler) = &handler {
            handler.on_disconnect(&peer);
        }
        peer.close().await;
    }

    async fn read_loop(&self, peer: &Peer, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        loop {
            let rpc = tokio::select! {
                _ = shutdown_requested(shutdown) => return Ok(()),
                _ = peer.wait_closed() => return Ok(()),
                rpc = peer.read_rpc(self.max_frame_len) => rpc?,
            };
            let Some(rpc) = rpc else {
                return Ok(());
            };

            if rpc.stream {
                peer.gate().open();
                tracing::debug!(peer = %peer.addr(), "incoming stream, waiting");
                tokio::select! {
                    _ = shutdown_requested(shutdown) => return Ok(()),
                    _ = peer.wait_closed() => return Ok(()),
                    _ = peer.gate().wait_for(PeerMode::Framing) => {}
                }
                tracing::debug!(peer = %peer.addr(), "stream closed, resuming read loop");
                continue;
            }

            tokio::select! {
                _ = shutdown_requested(shutdown) => return Ok(()),
                sent = self.inbound.send(rpc) => {
                    if sent.is_err() {
                        return Err(TransportError::Closed);
                    }
                }
            }
        }
    }
}

/// Resolves once `true` has been published on the shutdown channel.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
