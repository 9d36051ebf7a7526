//! Cluster membership and peer routing.
//!
//! `PeerPool` owns the consistent hash ring and one `PeerConnection` per
//! remote member. Cache groups reach it through the `PeerPicker` trait, so a
//! group never needs to know whether a pool exists.

pub mod connection;
pub mod picker;
pub mod pool;

pub use connection::PeerConnection;
pub use picker::{peer_picker, register_peer_picker, NoPeers, PeerGetter, PeerPicker};
pub use pool::PeerPool;
