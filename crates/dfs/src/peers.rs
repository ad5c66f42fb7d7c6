//! Registry of connected peers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use dfs_p2p::{Peer, PeerHandler, TransportError};

/// Connected peers keyed by remote address.
///
/// Installed as the transport's [`PeerHandler`], so connections register
/// and unregister themselves.
#[derive(Default)]
pub(crate) struct PeerSet {
    peers: Mutex<BTreeMap<String, Arc<Peer>>>,
}

impl PeerSet {
    pub(crate) fn get(&self, addr: &str) -> Option<Arc<Peer>> {
        self.lock().get(addr).cloned()
    }

    /// Current peers in address order. The lock is released on return.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Peer>> {
        self.lock().values().cloned().collect()
    }

    pub(crate) fn addrs(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<Peer>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PeerHandler for PeerSet {
    fn on_peer(&self, peer: Arc<Peer>) -> dfs_p2p::Result<()> {
        let mut peers = self.lock();
        if peers.contains_key(peer.addr()) {
            return Err(TransportError::PeerRejected(format!(
                "already connected to {}",
                peer.addr()
            )));
        }
        tracing::info!(peer = %peer.addr(), outbound = peer.is_outbound(), "connected with remote");
        peers.insert(peer.addr().to_string(), peer);
        Ok(())
    }

    fn on_disconnect(&self, peer: &Peer) {
        let mut peers = self.lock();
        // Only forget the entry if it is this very connection.
        if peers
            .get(peer.addr())
            .is_some_and(|p| std::ptr::eq(Arc::as_ptr(p), peer))
        {
            peers.remove(peer.addr());
            tracing::info!(peer = %peer.addr(), "peer removed");
        }
    }
}
