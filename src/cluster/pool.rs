//! The peer pool: membership, key ownership and peer connections.
//!
//! Membership is held as an immutable snapshot (`ring` + `connections`)
//! behind a read/write lock. Readers clone nothing but the connection they
//! need. Writers are serialised by an async mutex, dial new peers without
//! blocking readers, and publish the next snapshot in a single swap, so no
//! reader ever sees a ring that disagrees with the connection map.

use crate::cache::{BytesSink, GroupRegistry};
use crate::cluster::connection::PeerConnection;
use crate::cluster::picker::{register_peer_picker, PeerGetter, PeerPicker};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::network::service::{PeerService, ServiceRegistrar};
use crate::partitioning::HashRing;
use crate::types::CallContext;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

static POOL_CREATED: AtomicBool = AtomicBool::new(false);

/// One consistent view of the cluster.
///
/// The keys of `connections` are exactly the addresses in `ring`. The
/// pool's own address is dialed like any other member; it is only told apart
/// when picking an owner.
#[derive(Debug, Clone)]
struct Membership {
    ring: HashRing,
    connections: HashMap<String, Arc<PeerConnection>>,
}

impl Membership {
    fn empty(config: &PoolConfig) -> Self {
        Self {
            ring: HashRing::new(config.replicas, config.hash_fn),
            connections: HashMap::new(),
        }
    }
}

/// Process-wide pool of connections to the other cache members.
pub struct PeerPool {
    self_addr: String,
    config: PoolConfig,
    membership: RwLock<Arc<Membership>>,
    /// Serialises membership changes.
    writer: Mutex<()>,
    registry: Arc<GroupRegistry>,
}

impl PeerPool {
    /// Build the process-wide pool.
    ///
    /// Registers the pool as the process peer picker and its handlers on
    /// `registrar`. May be called once per process; later calls fail with
    /// `Error::Config`.
    pub fn construct(
        self_addr: impl Into<String>,
        registrar: &dyn ServiceRegistrar,
        config: PoolConfig,
    ) -> Result<Arc<Self>> {
        if POOL_CREATED.swap(true, Ordering::SeqCst) {
            return Err(Error::Config(
                "peer pool must be constructed only once per process".to_string(),
            ));
        }

        let pool = Arc::new(Self::new(self_addr, config, GroupRegistry::global()));
        register_peer_picker(pool.clone())?;
        registrar.register_peer_service(pool.clone());

        info!(
            self_addr = %pool.self_addr,
            replicas = pool.config.replicas,
            "Peer pool constructed"
        );
        Ok(pool)
    }

    /// Build a pool that is neither registered as the process picker nor
    /// attached to a server.
    pub(crate) fn new(
        self_addr: impl Into<String>,
        config: PoolConfig,
        registry: Arc<GroupRegistry>,
    ) -> Self {
        let config = config.normalized();
        Self {
            self_addr: self_addr.into(),
            membership: RwLock::new(Arc::new(Membership::empty(&config))),
            config,
            writer: Mutex::new(()),
            registry,
        }
    }

    /// This member's own address.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<Membership> {
        self.membership.read().clone()
    }

    /// Number of members with a connection.
    pub fn peer_count(&self) -> usize {
        self.membership.read().connections.len()
    }

    /// Whether `addr` is part of the ring.
    pub fn contains_peer(&self, addr: &str) -> bool {
        self.membership.read().ring.contains(addr)
    }

    /// Every address on the ring, sorted.
    pub fn members(&self) -> Vec<String> {
        self.membership.read().ring.nodes().to_vec()
    }

    /// Replace the membership with `peers`.
    ///
    /// Connections to peers that stay are reused, new peers are dialed, and
    /// peers no longer listed are closed. Peers that cannot be dialed are
    /// logged and left out.
    pub async fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _writer = self.writer.lock().await;
        let current = self.snapshot();
        let mut next = Membership::empty(&self.config);

        for peer in peers {
            let peer = peer.into();
            if next.ring.contains(&peer) {
                continue;
            }
            if let Some(conn) = current.connections.get(&peer) {
                next.connections.insert(peer.clone(), conn.clone());
                next.ring.add_node(&peer);
                continue;
            }
            match PeerConnection::open(peer.clone(), &self.config.dial).await {
                Ok(conn) => {
                    info!(peer = %peer, "Adding peer");
                    next.connections.insert(peer.clone(), conn);
                    next.ring.add_node(&peer);
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Failed to open connection to peer");
                }
            }
        }

        let stale: Vec<Arc<PeerConnection>> = current
            .connections
            .iter()
            .filter(|(addr, _)| !next.connections.contains_key(*addr))
            .map(|(_, conn)| conn.clone())
            .collect();

        let members = next.ring.node_count();
        *self.membership.write() = Arc::new(next);

        for conn in stale {
            info!(peer = %conn.address(), "Removing peer");
            conn.close();
        }
        debug!(self_addr = %self.self_addr, members, "Membership replaced");
    }

    /// Add peers not already present. Existing peers are left untouched.
    pub async fn add_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _writer = self.writer.lock().await;
        let mut next = (*self.snapshot()).clone();
        let mut changed = false;

        for peer in peers {
            let peer = peer.into();
            if next.ring.contains(&peer) {
                continue;
            }
            match PeerConnection::open(peer.clone(), &self.config.dial).await {
                Ok(conn) => {
                    info!(peer = %peer, "Adding peer");
                    next.connections.insert(peer.clone(), conn);
                    next.ring.add_node(&peer);
                    changed = true;
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Failed to open connection to peer");
                }
            }
        }

        if changed {
            *self.membership.write() = Arc::new(next);
        }
    }

    /// Remove and close the listed peers. Unknown addresses are ignored.
    pub async fn remove_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _writer = self.writer.lock().await;
        let mut next = (*self.snapshot()).clone();
        let mut removed = Vec::new();
        let mut changed = false;

        for peer in peers {
            let peer = peer.into();
            if !next.ring.contains(&peer) {
                continue;
            }
            next.ring.remove(&peer);
            if let Some(conn) = next.connections.remove(&peer) {
                removed.push(conn);
            }
            changed = true;
            info!(peer = %peer, "Removing peer");
        }

        if !changed {
            return;
        }
        *self.membership.write() = Arc::new(next);

        for conn in removed {
            conn.close();
        }
    }

    /// Independent copy of every member connection.
    pub fn all_peers(&self) -> Vec<Arc<PeerConnection>> {
        self.membership.read().connections.values().cloned().collect()
    }

    /// The connection to the remote owner of `key`.
    ///
    /// `None` means the key is served locally: the ring is empty or this
    /// member owns the key.
    pub fn pick_peer(&self, key: &str) -> Option<Arc<PeerConnection>> {
        let membership = self.membership.read();
        let owner = membership.ring.get(key)?;
        if owner == self.self_addr {
            return None;
        }

        match membership.connections.get(owner) {
            Some(conn) => Some(conn.clone()),
            None => {
                error!(owner, key, "Ring owner has no connection");
                None
            }
        }
    }

    /// Close every connection and empty the membership.
    pub async fn shutdown(&self) {
        let _writer = self.writer.lock().await;
        let previous = std::mem::replace(
            &mut *self.membership.write(),
            Arc::new(Membership::empty(&self.config)),
        );
        for conn in previous.connections.values() {
            conn.close();
        }
        info!(self_addr = %self.self_addr, "Peer pool shut down");
    }
}

impl std::fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPool")
            .field("self_addr", &self.self_addr)
            .field("members", &self.members())
            .finish()
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        PeerPool::pick_peer(self, key).map(|conn| conn as Arc<dyn PeerGetter>)
    }

    fn all_peers(&self) -> Vec<Arc<dyn PeerGetter>> {
        PeerPool::all_peers(self)
            .into_iter()
            .map(|conn| conn as Arc<dyn PeerGetter>)
            .collect()
    }
}

#[async_trait]
impl PeerService for PeerPool {
    async fn retrieve(&self, ctx: CallContext, group: &str, key: &str) -> Result<Bytes> {
        let group = self
            .registry
            .get_group(group)
            .ok_or_else(|| Error::GroupNotFound(group.to_string()))?;

        group.record_server_request();
        let mut sink = BytesSink::new();
        group.get(ctx, key, &mut sink).await?;
        Ok(sink.into_bytes())
    }

    async fn delete(&self, _ctx: CallContext, group: &str, key: &str) -> Result<()> {
        let group = self
            .registry
            .get_group(group)
            .ok_or_else(|| Error::GroupNotFound(group.to_string()))?;

        group.record_server_request();
        group.local_remove(key).await;
        Ok(())
    }

    async fn add_peers(&self, addrs: Vec<String>) {
        PeerPool::add_peers(self, addrs).await;
    }

    async fn remove_peers(&self, addrs: Vec<String>) {
        PeerPool::remove_peers(self, addrs).await;
    }

    async fn set_peers(&self, addrs: Vec<String>) {
        PeerPool::set_peers(self, addrs).await;
    }
}
