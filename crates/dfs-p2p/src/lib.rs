//! # dfs p2p
//!
//! Peer transport for the replicated store.
//!
//! ## Overview
//!
//! A [`Transport`] listens for and dials connections, runs an optional
//! [`Handshake`] on each, reports accepted ones to a [`PeerHandler`] and
//! decodes their traffic. Two kinds of unit share a connection:
//!
//! - **MESSAGE**: a length-prefixed payload, delivered through
//!   [`Transport::recv`].
//! - **STREAM**: a marker after which raw bytes follow. The read loop parks
//!   until the application takes them with [`Peer::await_stream`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dfs_p2p::{Peer, PeerHandler, TcpTransport, TcpTransportConfig, Transport};
//!
//! struct Log;
//!
//! impl PeerHandler for Log {
//!     fn on_peer(&self, peer: Arc<Peer>) -> dfs_p2p::Result<()> {
//!         println!("connected: {}", peer.addr());
//!         Ok(())
//!     }
//! }
//!
//! async fn example() -> dfs_p2p::Result<()> {
//!     let transport = TcpTransport::new(TcpTransportConfig::default());
//!     transport.set_peer_handler(Arc::new(Log));
//!     transport.listen().await?;
//!
//!     loop {
//!         let rpc = transport.recv().await?;
//!         println!("{} bytes from {}", rpc.payload.len(), rpc.from);
//!     }
//! }
//! ```
//!
//! ## Stream Flow
//!
//! ```text
//! Node A                              Node B (read loop)
//!   |-------- MESSAGE (StoreFile) ---->|  queued for recv()
//!   |-------- STREAM ----------------->|  gate opens, loop parks
//!   |-------- raw bytes -------------->|  await_stream() consumes
//!   |                                  |  gate closes, loop resumes
//! ```

mod conn;
pub mod error;
pub mod frame;
pub mod gate;
pub mod handshake;
pub mod peer;
pub mod rpc;
pub mod tcp;
pub mod transport;

pub use error::{Result, TransportError};
pub use frame::{DEFAULT_MAX_FRAME_LEN, INCOMING_MESSAGE, INCOMING_STREAM};
pub use gate::{PeerMode, StreamGate};
pub use handshake::{Handshake, NopHandshake, VersionHandshake, HANDSHAKE_MAGIC, PROTOCOL_VERSION};
pub use peer::{BoxedReader, BoxedWriter, Peer, RawStream};
pub use rpc::Rpc;
pub use tcp::{TcpTransport, TcpTransportConfig};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, PeerHandler, Transport};
