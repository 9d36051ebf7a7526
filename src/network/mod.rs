//! Network communication layer.

pub mod rpc;
pub mod server;
pub mod service;

pub use rpc::{KeyRequest, Message, Peers, RetrieveResponse};
pub use server::{NetworkServer, ServerRegistrar};
pub use service::{dispatch, PeerService, ServiceRegistrar};
