//! Helpers for tests that run real members on loopback sockets.
//!
//! Each `TestMember` is a `NetworkServer` bound to an OS-assigned port with a
//! private `PeerPool` and `GroupRegistry` behind it, so several members can
//! live in one test process without touching the process-wide singletons.

mod cluster_tests;

use crate::cache::{Getter, Group, GroupRegistry};
use crate::cluster::PeerPool;
use crate::config::PoolConfig;
use crate::network::{NetworkServer, ServiceRegistrar};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A running member: server, pool and groups.
pub(crate) struct TestMember {
    pub addr: String,
    pub pool: Arc<PeerPool>,
    pub registry: Arc<GroupRegistry>,
    shutdown: mpsc::Sender<()>,
}

impl TestMember {
    /// Register a group whose misses are routed through this member's pool.
    pub fn add_group(&self, name: &str, getter: Arc<dyn Getter>) -> Arc<Group> {
        self.registry
            .register(Group::new(name, 1 << 20, getter).with_picker(self.pool.clone()))
            .unwrap()
    }

    /// Stop accepting new connections.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(()).await;
    }
}

/// Start a member on `127.0.0.1:0`.
pub(crate) async fn spawn_member() -> TestMember {
    spawn_member_with(PoolConfig::default()).await
}

pub(crate) async fn spawn_member_with(config: PoolConfig) -> TestMember {
    let (server, shutdown) = NetworkServer::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().to_string();
    let registry = Arc::new(GroupRegistry::new());
    let pool = Arc::new(PeerPool::new(addr.clone(), config, registry.clone()));
    server.register_peer_service(pool.clone());
    tokio::spawn(server.run());

    TestMember {
        addr,
        pool,
        registry,
        shutdown,
    }
}

/// Start `n` members that all know each other.
pub(crate) async fn spawn_cluster(n: usize) -> Vec<TestMember> {
    let mut members = Vec::with_capacity(n);
    for _ in 0..n {
        members.push(spawn_member().await);
    }
    let addrs: Vec<String> = members.iter().map(|m| m.addr.clone()).collect();
    for member in &members {
        member.pool.set_peers(addrs.clone()).await;
    }
    members
}

/// An address nothing listens on.
pub(crate) async fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}
