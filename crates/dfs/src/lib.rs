//! # dfs
//!
//! A replicated, content-addressable file store over a peer-to-peer
//! transport.
//!
//! ## Overview
//!
//! Each node runs a [`FileServer`] that owns a local content store and a
//! transport. Storing a file writes it locally and pushes an encrypted copy
//! to every connected peer. Getting a file serves it from disk when present
//! and otherwise asks the network for it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dfs::{FileServer, FileServerConfig};
//! use dfs::p2p::{TcpTransport, TcpTransportConfig};
//!
//! async fn example() -> dfs::Result<()> {
//!     let transport = TcpTransport::new(TcpTransportConfig {
//!         listen_addr: "127.0.0.1:4000".into(),
//!         ..Default::default()
//!     });
//!     let config = FileServerConfig {
//!         storage_root: "4000_network".into(),
//!         bootstrap_nodes: vec!["127.0.0.1:3000".into()],
//!         ..Default::default()
//!     };
//!
//!     let server = Arc::new(FileServer::new(config, transport));
//!     let event_loop = server.start().await?;
//!
//!     server.store("picture_1.png", &mut &b"my big data file here!"[..]).await?;
//!     let (size, _file) = server.get("picture_1.png").await?;
//!     println!("{size} bytes");
//!
//!     server.stop();
//!     let _ = event_loop.await;
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Node A (store)                      Node B (event loop)
//!   |-------- StoreFile{key,size} ---->|
//!   |-------- STREAM + ciphertext ---->|  write_decrypt into store
//!
//! Node A (get)                        Node B (event loop)
//!   |-------- GetFile{key} ----------->|
//!   |<------- STREAM + u64 len --------|  0 when absent
//!   |<------- ciphertext --------------|
//! ```
//!
//! ## Re-exports
//!
//! - `dfs::core` - Path transforms and protocol messages
//! - `dfs::crypto` - Stream cipher
//! - `dfs::store` - Local content store
//! - `dfs::p2p` - Peer transport

pub mod config;
pub mod error;
mod peers;
pub mod server;

// Re-export component crates
pub use dfs_core as core;
pub use dfs_crypto as crypto;
pub use dfs_p2p as p2p;
pub use dfs_store as store;

// Re-export main types for convenience
pub use config::FileServerConfig;
pub use error::{FileServerError, Result};
pub use server::FileServer;

pub use dfs_core::{Message, PathKey, PathTransform};
pub use dfs_crypto::EncryptionKey;
