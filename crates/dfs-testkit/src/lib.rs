//! # dfs testkit
//!
//! Testing utilities for dfs.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known content-addressed paths and AES-256-CTR answers
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Multi-node clusters over the in-memory transport
//!
//! ## Golden Vectors
//!
//! ```rust
//! use dfs_testkit::vectors::{check_path_vector, path_vectors};
//!
//! for vector in path_vectors() {
//!     assert!(check_path_vector(&vector), "{}", vector.name);
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use dfs_testkit::fixtures::TestCluster;
//!
//! async fn example() {
//!     let mut cluster = TestCluster::new();
//!     let a = cluster.add_node(":3000", &[]).await;
//!     let b = cluster.add_node(":4000", &[":3000"]).await;
//!
//!     cluster.node(a).store("X", b"hello").await.unwrap();
//!     assert_eq!(cluster.node(b).get("X").await.unwrap(), b"hello");
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, TestCluster, TestNode};
