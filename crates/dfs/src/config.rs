//! File server configuration.

use std::path::PathBuf;
use std::time::Duration;

use dfs_core::PathTransform;
use dfs_crypto::EncryptionKey;
use dfs_store::{StoreConfig, DEFAULT_ROOT};

/// Configuration for a [`FileServer`](crate::FileServer).
#[derive(Debug, Clone)]
pub struct FileServerConfig {
    /// Local storage root.
    pub storage_root: PathBuf,
    /// Key-to-path mapping for the local store.
    pub path_transform: PathTransform,
    /// Addresses dialed on start.
    pub bootstrap_nodes: Vec<String>,
    /// Key for replicated bytes. Every node of a network must share it.
    pub encryption_key: EncryptionKey,
    /// How long to wait for a peer's raw stream.
    pub stream_timeout: Duration,
}

impl FileServerConfig {
    /// Configuration of the local content store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            root: self.storage_root.clone(),
            path_transform: self.path_transform,
        }
    }
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_ROOT),
            path_transform: PathTransform::default(),
            bootstrap_nodes: Vec::new(),
            encryption_key: EncryptionKey::generate(),
            stream_timeout: Duration::from_secs(5),
        }
    }
}
