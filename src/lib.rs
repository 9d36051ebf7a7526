//! Peer-to-peer distributed cache.
//!
//! Every member of the cluster runs the same binary. Keys are spread over the
//! members with a consistent hash ring; a miss on one member is forwarded to
//! the key's owner, which loads the value from the source of truth and keeps
//! it in its local cache.
//!
//! - **Moka** for the size-bounded local store of each cache group
//! - **Tokio** TCP with length-prefixed **bincode** frames between members
//! - **xxHash** for ring placement
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use peercache::cache::{GetterFn, GroupRegistry, StringSink};
//! use peercache::network::NetworkServer;
//! use peercache::{CallContext, PeerPool, PoolConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (server, _shutdown) = NetworkServer::bind("127.0.0.1:9000".parse()?).await?;
//!     let pool = PeerPool::construct("127.0.0.1:9000", &server, PoolConfig::default())?;
//!     tokio::spawn(server.run());
//!
//!     pool.set_peers(["127.0.0.1:9000", "127.0.0.1:9001", "127.0.0.1:9002"]).await;
//!
//!     let users = GroupRegistry::global().new_group(
//!         "users",
//!         64 << 20,
//!         Arc::new(GetterFn(|key: &str| Ok(Bytes::from(format!("profile:{}", key))))),
//!     )?;
//!
//!     let mut sink = StringSink::new();
//!     users.get(CallContext::background(), "alice", &mut sink).await?;
//!     println!("{:?}", sink.value());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  miss   ┌──────────────┐  owner?  ┌──────────────┐
//! │    Group     │ ──────▶ │  PeerPicker  │ ───────▶ │   HashRing   │
//! │ (moka store) │         │  (PeerPool)  │          └──────────────┘
//! └──────────────┘         └──────────────┘
//!        │ local owner            │ remote owner
//!        ▼                        ▼
//! ┌──────────────┐         ┌──────────────┐   TCP    ┌──────────────┐
//! │    Getter    │         │PeerConnection│ ───────▶ │NetworkServer │
//! └──────────────┘         └──────────────┘          │ (PeerService)│
//!                                                    └──────────────┘
//! ```

pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod partitioning;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

// Re-export main types for convenience
pub use cache::{BytesSink, Getter, GetterFn, Group, GroupRegistry, Sink, StringSink};
pub use cluster::{PeerConnection, PeerGetter, PeerPicker, PeerPool};
pub use config::{DialOptions, PoolConfig, DEFAULT_MAX_FRAME_SIZE, DEFAULT_REPLICAS};
pub use error::{Error, NetworkError, Result};
pub use network::{NetworkServer, PeerService, ServiceRegistrar};
pub use partitioning::{HashFn, HashRing};
pub use types::{CallContext, GroupStats};
