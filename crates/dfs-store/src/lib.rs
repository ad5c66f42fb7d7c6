//! # dfs store
//!
//! Local file storage for the dfs node. Keys are mapped to paths under a
//! storage root by a [`PathTransform`](dfs_core::PathTransform); contents are
//! streamed in and out without buffering whole files.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dfs_store::{Store, StoreConfig};
//! use tokio::io::AsyncReadExt;
//!
//! async fn example() -> dfs_store::Result<()> {
//!     let store = Store::new(StoreConfig {
//!         root: "/var/lib/dfs".into(),
//!         ..StoreConfig::default()
//!     });
//!
//!     store.write("mybestpictures", &mut &b"some jpg bytes"[..]).await?;
//!     assert!(store.has("mybestpictures").await);
//!
//!     let (size, mut file) = store.read("mybestpictures").await?;
//!     let mut contents = Vec::with_capacity(size as usize);
//!     file.read_to_end(&mut contents).await?;
//!
//!     store.delete("mybestpictures").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No internal locking**: concurrent writers to one key race at the
//!   filesystem level; the last write wins.
//! - **Idempotent delete**: deleting an absent key succeeds.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{Store, StoreConfig, DEFAULT_ROOT};
