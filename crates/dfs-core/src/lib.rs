//! # dfs core
//!
//! Pure primitives for the dfs replicated content store: key-to-path
//! transforms and the messages nodes exchange.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PathKey`] - Where a key lives relative to a storage root
//! - [`PathTransform`] - Content-addressed, identity, or custom key mapping
//! - [`Message`] - The replication protocol's tagged union
//!
//! ## Content addressing
//!
//! The default transform hashes the key with SHA-1 and nests the file under
//! eight 5-character directories cut from the hex digest:
//!
//! ```rust
//! use dfs_core::PathTransform;
//!
//! let path_key = PathTransform::ContentAddressed.apply("mybestpictures");
//! assert_eq!(path_key.path_name, "7037c/79055/7f0d8/61c53/d3bbd/1fafe/02dc3/699e6");
//! assert_eq!(path_key.file_name, "7037c790557f0d861c53d3bbd1fafe02dc3699e6");
//! ```

pub mod error;
pub mod message;
pub mod path;

pub use error::{CoreError, Result};
pub use message::{limits, Message};
pub use path::{cas_path_transform, identity_path_transform, PathKey, PathTransform};
