//! The file server: replicated `store`/`get` over a [`Transport`].
//!
//! Local calls ([`FileServer::store`], [`FileServer::get`]) run on the
//! caller's task. Messages from peers are handled by a single event loop,
//! which is the only writer of the local store in response to the network.

use std::sync::Arc;

use dfs_core::Message;
use dfs_crypto::{encrypt_stream, IV_LEN};
use dfs_p2p::{frame, Peer, RawStream, Rpc, Transport, TransportError};
use dfs_store::{Store, StoreError};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::FileServerConfig;
use crate::error::{FileServerError, Result};
use crate::peers::PeerSet;

/// A node of the replicated store.
pub struct FileServer<T: Transport> {
    config: FileServerConfig,
    store: Store,
    transport: T,
    peers: Arc<PeerSet>,
    shutdown: watch::Sender<bool>,
}

impl<T: Transport> FileServer<T> {
    /// Create a server. Installs its peer registry on `transport`.
    pub fn new(config: FileServerConfig, transport: T) -> Self {
        let store = Store::new(config.store_config());
        let peers = Arc::new(PeerSet::default());
        transport.set_peer_handler(Arc::clone(&peers) as Arc<dyn dfs_p2p::PeerHandler>);
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            store,
            transport,
            peers,
            shutdown,
        }
    }

    /// Local address of the transport.
    pub fn addr(&self) -> String {
        self.transport.addr()
    }

    /// The local content store.
    pub fn content_store(&self) -> &Store {
        &self.store
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Addresses of connected peers.
    pub fn peers(&self) -> Vec<String> {
        self.peers.addrs()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Listen, dial the bootstrap nodes and spawn the event loop.
    ///
    /// A failed bootstrap dial is logged and skipped. The returned handle
    /// completes after [`FileServer::stop`] once the transport is closed.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        self.transport.listen().await?;
        tracing::info!(addr = %self.addr(), "file server listening");

        for addr in self.config.bootstrap_nodes.iter().filter(|a| !a.is_empty()) {
            tracing::debug!(local = %self.addr(), remote = %addr, "dialing bootstrap node");
            if let Err(e) = self.transport.dial(addr).await {
                tracing::warn!(remote = %addr, error = %e, "failed to dial bootstrap node");
            }
        }

        let server = Arc::clone(self);
        Ok(tokio::spawn(async move { server.run().await }))
    }

    /// Ask the event loop to exit. The loop closes the transport.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let rpc = tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                rpc = self.transport.recv() => match rpc {
                    Ok(rpc) => rpc,
                    Err(e) => {
                        tracing::warn!(error = %e, "transport stopped delivering messages");
                        break;
                    }
                },
            };

            let from = rpc.from.clone();
            tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                handled = self.handle_rpc(rpc) => {
                    if let Err(e) = handled {
                        tracing::warn!(peer = %from, error = %e, "failed to handle message");
                    }
                }
            }
        }

        tracing::info!(addr = %self.addr(), "file server stopped");
        if let Err(e) = self.transport.close().await {
            tracing::warn!(error = %e, "failed to close transport");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store everything `src` yields under `key`, locally and on every peer.
    ///
    /// Each peer receives a `StoreFile` announcement immediately followed by
    /// a STREAM marker and the encrypted bytes, written as one unit. The
    /// first failing peer aborts the call. Returns the plaintext length.
    pub async fn store<R>(&self, key: &str, src: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut plaintext = Vec::new();
        src.read_to_end(&mut plaintext).await?;
        let written = self.store.write(key, &mut plaintext.as_slice()).await?;

        let peers = self.peers.snapshot();
        if peers.is_empty() {
            return Ok(written);
        }

        let mut sealed = Vec::with_capacity(IV_LEN + plaintext.len());
        encrypt_stream(
            &self.config.encryption_key,
            &mut plaintext.as_slice(),
            &mut sealed,
        )
        .await?;

        let announcement = Message::StoreFile {
            key: key.to_string(),
            size: sealed.len() as u64,
        }
        .to_bytes()?;

        for peer in &peers {
            let mut writer = peer.writer().await;
            frame::write_message(&mut **writer, &announcement).await?;
            frame::write_stream_marker(&mut **writer).await?;
            writer.write_all(&sealed).await?;
            writer.flush().await?;
        }

        tracing::info!(
            addr = %self.addr(),
            key = %key,
            bytes = written,
            peers = peers.len(),
            "stored and replicated"
        );
        Ok(written)
    }

    /// Fetch `key`, from local disk if present, otherwise from the network.
    ///
    /// Every peer's response is read, so no connection is left waiting on
    /// an unread stream. The first non-empty one is stored locally; later
    /// copies are discarded. A peer that does not answer within the stream
    /// timeout, or sends less than it announced, counts as not having the
    /// file. A peer that timed out is also disconnected.
    pub async fn get(&self, key: &str) -> Result<(u64, File)> {
        if self.store.has(key).await {
            tracing::info!(addr = %self.addr(), key = %key, "serving file from local disk");
            return Ok(self.store.read(key).await?);
        }

        let peers = self.peers.snapshot();
        if peers.is_empty() {
            return Err(FileServerError::NotFound(key.to_string()));
        }

        tracing::info!(
            addr = %self.addr(),
            key = %key,
            "don't have file locally, fetching from network"
        );
        self.broadcast(&Message::GetFile {
            key: key.to_string(),
        })
        .await?;

        let mut found = false;
        for peer in &peers {
            match self.receive_file(peer, key, !found).await {
                Ok(stored) => found |= stored,
                Err(e) => {
                    tracing::warn!(peer = %peer.addr(), key = %key, error = %e, "no usable response");
                }
            }
        }

        if !found {
            return Err(FileServerError::NotFound(key.to_string()));
        }
        Ok(self.store.read(key).await?)
    }

    /// Send `message` to every connected peer. The first failure aborts.
    pub async fn broadcast(&self, message: &Message) -> Result<()> {
        let payload = message.to_bytes()?;
        for peer in self.peers.snapshot() {
            peer.send_message(&payload).await?;
        }
        Ok(())
    }

    /// Read one `Get` response from `peer`. Returns whether it was stored.
    async fn receive_file(&self, peer: &Peer, key: &str, keep: bool) -> Result<bool> {
        let mut raw = self.await_stream(peer).await?;
        let size = raw.read_u64_le().await?;
        if size == 0 {
            tracing::debug!(peer = %peer.addr(), key = %key, "peer does not have the file");
            return Ok(false);
        }

        let mut body = (&mut raw).take(size);
        if !keep {
            tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
            return Ok(false);
        }

        let n = self.write_from_peer(key, &mut body, size).await?;
        tracing::info!(
            addr = %self.addr(),
            peer = %peer.addr(),
            key = %key,
            bytes = n,
            "received file over the network"
        );
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event loop handlers
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_rpc(&self, rpc: Rpc) -> Result<()> {
        match Message::from_bytes(&rpc.payload)? {
            Message::StoreFile { key, size } => self.handle_store_file(&rpc.from, &key, size).await,
            Message::GetFile { key } => self.handle_get_file(&rpc.from, &key).await,
        }
    }

    async fn handle_store_file(&self, from: &str, key: &str, size: u64) -> Result<()> {
        let peer = self
            .peers
            .get(from)
            .ok_or_else(|| FileServerError::PeerNotFound(from.to_string()))?;

        let raw = self.await_stream(&peer).await?;
        let mut body = raw.take(size);
        let n = self.write_from_peer(key, &mut body, size).await?;

        tracing::info!(addr = %self.addr(), peer = %from, key = %key, bytes = n, "stored replicated file");
        Ok(())
    }

    async fn handle_get_file(&self, from: &str, key: &str) -> Result<()> {
        let peer = self
            .peers
            .get(from)
            .ok_or_else(|| FileServerError::PeerNotFound(from.to_string()))?;

        let (size, mut file) = match self.store.read(key).await {
            Ok(found) => found,
            Err(StoreError::NotFound(_)) => {
                tracing::info!(addr = %self.addr(), key = %key, "need to serve file but it does not exist on disk");
                return send_absent(&peer).await;
            }
            Err(e) => {
                send_absent(&peer).await?;
                return Err(e.into());
            }
        };

        let announced = size + IV_LEN as u64;
        let sent = {
            let mut writer = peer.writer().await;
            frame::write_stream_marker(&mut **writer).await?;
            writer.write_u64_le(announced).await?;
            encrypt_stream(
                &self.config.encryption_key,
                &mut (&mut file).take(size),
                &mut **writer,
            )
            .await?
        };

        if sent != announced {
            // The requester is now waiting for bytes that will never come.
            peer.close().await;
            return Err(FileServerError::ShortStream {
                key: key.to_string(),
                expected: announced,
                actual: sent,
            });
        }

        tracing::info!(addr = %self.addr(), peer = %from, key = %key, bytes = size, "served file over the network");
        Ok(())
    }

    /// Decrypt a peer's stream of `announced` bytes into the store.
    ///
    /// On failure the rest of `body` is drained, keeping the connection
    /// framed, and the partial file is removed. A stream that ends before
    /// `announced` bytes arrived is a failure too.
    async fn write_from_peer<R>(&self, key: &str, body: &mut R, announced: u64) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let written = self
            .store
            .write_decrypt(key, &self.config.encryption_key, &mut *body)
            .await
            .map_err(FileServerError::from)
            .and_then(|n| {
                let actual = n + IV_LEN as u64;
                if actual == announced {
                    Ok(n)
                } else {
                    Err(FileServerError::ShortStream {
                        key: key.to_string(),
                        expected: announced,
                        actual,
                    })
                }
            });

        match written {
            Ok(n) => Ok(n),
            Err(e) => {
                tokio::io::copy(body, &mut tokio::io::sink()).await?;
                if let Err(cleanup) = self.store.delete(key).await {
                    tracing::warn!(key = %key, error = %cleanup, "failed to remove partial file");
                }
                tracing::warn!(addr = %self.addr(), key = %key, error = %e, "discarded incomplete file");
                Err(e)
            }
        }
    }

    /// Wait for `peer`'s next stream. A peer that misses the deadline is
    /// disconnected, since a late stream would be read by the wrong consumer.
    async fn await_stream<'a>(&self, peer: &'a Peer) -> Result<RawStream<'a>> {
        match peer.await_stream(self.config.stream_timeout).await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                if matches!(e, TransportError::StreamTimeout(_)) {
                    tracing::warn!(addr = %self.addr(), peer = %peer.addr(), "no stream in time, closing connection");
                    peer.close().await;
                }
                Err(e.into())
            }
        }
    }
}

async fn send_absent(peer: &Peer) -> Result<()> {
    let mut writer = peer.writer().await;
    frame::write_stream_marker(&mut **writer).await?;
    writer.write_u64_le(0).await?;
    writer.flush().await?;
    Ok(())
}

async fn stop_requested(rx: &mut watch::Receiver<bool>) {
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
