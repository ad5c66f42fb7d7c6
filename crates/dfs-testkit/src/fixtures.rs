//! Test fixtures and helpers.
//!
//! Multi-node setups over the in-memory transport, each node with its own
//! temporary storage root.

use std::sync::Arc;
use std::time::Duration;

use dfs::{FileServer, FileServerConfig};
use dfs_crypto::EncryptionKey;
use dfs_p2p::{MemoryNetwork, MemoryTransport};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

/// How long fixtures wait for connections to register.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Stream timeout used by fixture nodes.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(2);

/// Install a `tracing` subscriber that honours `RUST_LOG` and writes through
/// the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A running file server on a memory network.
pub struct TestNode {
    pub server: Arc<FileServer<MemoryTransport>>,
    event_loop: Option<JoinHandle<()>>,
    _dir: TempDir,
}

impl TestNode {
    /// Start a node at `addr` that dials `bootstrap` on start.
    pub async fn start(
        network: &Arc<MemoryNetwork>,
        addr: &str,
        bootstrap: &[&str],
        key: &EncryptionKey,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = FileServerConfig {
            storage_root: dir.path().join(format!("{}_network", addr)),
            bootstrap_nodes: bootstrap.iter().map(|s| s.to_string()).collect(),
            encryption_key: key.clone(),
            stream_timeout: STREAM_TIMEOUT,
            ..FileServerConfig::default()
        };

        let server = Arc::new(FileServer::new(config, network.create_transport(addr)));
        let event_loop = server.start().await.expect("start file server");

        Self {
            server,
            event_loop: Some(event_loop),
            _dir: dir,
        }
    }

    /// The node's address.
    pub fn addr(&self) -> String {
        self.server.addr()
    }

    /// Wait until at least `n` peers are registered.
    pub async fn wait_for_peers(&self, n: usize) {
        let waited = tokio::time::timeout(CONNECT_TIMEOUT, async {
            while self.server.peers().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "{} has peers {:?}, expected {}",
            self.addr(),
            self.server.peers(),
            n
        );
    }

    /// Store `data` under `key`.
    pub async fn store(&self, key: &str, data: &[u8]) -> dfs::Result<u64> {
        self.server.store(key, &mut &data[..]).await
    }

    /// Get `key` and read it fully.
    pub async fn get(&self, key: &str) -> dfs::Result<Vec<u8>> {
        let (size, mut file) = self.server.get(key).await?;
        let mut buf = Vec::with_capacity(size as usize);
        file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Read `key` from local disk only.
    pub async fn read_local(&self, key: &str) -> Option<Vec<u8>> {
        let (_, mut file) = self.server.content_store().read(key).await.ok()?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.ok()?;
        Some(buf)
    }

    /// Stop the event loop and wait for the transport to close.
    pub async fn shutdown(mut self) {
        self.server.stop();
        if let Some(event_loop) = self.event_loop.take() {
            let _ = tokio::time::timeout(CONNECT_TIMEOUT, event_loop).await;
        }
    }
}

/// Nodes sharing one memory network and one encryption key.
pub struct TestCluster {
    pub network: Arc<MemoryNetwork>,
    pub key: EncryptionKey,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// An empty cluster.
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            key: EncryptionKey::generate(),
            nodes: Vec::new(),
        }
    }

    /// Start a node and wait until it is connected to each bootstrap node.
    /// Returns its index.
    pub async fn add_node(&mut self, addr: &str, bootstrap: &[&str]) -> usize {
        let node = TestNode::start(&self.network, addr, bootstrap, &self.key).await;
        node.wait_for_peers(bootstrap.len()).await;
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Node by index.
    pub fn node(&self, index: usize) -> &TestNode {
        &self.nodes[index]
    }

    /// Stop every node.
    pub async fn shutdown(self) {
        for node in self.nodes {
            node.shutdown().await;
        }
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_p2p::Transport;

    #[tokio::test]
    async fn test_cluster_connects_both_ways() {
        init_tracing();
        let mut cluster = TestCluster::new();
        let a = cluster.add_node(":3000", &[]).await;
        let b = cluster.add_node(":4000", &[":3000"]).await;

        cluster.node(a).wait_for_peers(1).await;
        assert_eq!(cluster.node(a).server.peers(), vec![":4000".to_string()]);
        assert_eq!(cluster.node(b).server.peers(), vec![":3000".to_string()]);
        assert_eq!(cluster.node(b).server.transport().addr(), ":4000");

        cluster.shutdown().await;
    }
}
