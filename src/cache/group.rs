//! Named cache groups.

use crate::cache::sink::Sink;
use crate::cache::storage::GroupStorage;
use crate::cluster::picker::{peer_picker, PeerPicker};
use crate::error::{Error, Result};
use crate::metrics::GroupMetrics;
use crate::types::{CallContext, GroupStats};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of truth for values missing from every member's cache.
#[async_trait]
pub trait Getter: Send + Sync + 'static {
    async fn load(&self, ctx: CallContext, key: &str) -> Result<Bytes>;
}

/// Adapter turning a synchronous closure into a `Getter`.
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> Result<Bytes> + Send + Sync + 'static,
{
    async fn load(&self, _ctx: CallContext, key: &str) -> Result<Bytes> {
        (self.0)(key)
    }
}

/// A named local cache instance.
///
/// Misses are resolved by asking the peer picker for the key's owner; the
/// owner's value is returned without being stored here. Keys this member owns
/// (or any key, when no remote owner is reachable) are loaded from the
/// `Getter` and stored locally.
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    storage: GroupStorage,
    /// Overrides the process-wide picker.
    picker: Option<Arc<dyn PeerPicker>>,
    metrics: GroupMetrics,
}

impl Group {
    pub fn new(name: impl Into<String>, capacity_bytes: u64, getter: Arc<dyn Getter>) -> Self {
        Self {
            name: name.into(),
            getter,
            storage: GroupStorage::new(capacity_bytes),
            picker: None,
            metrics: GroupMetrics::new(),
        }
    }

    /// Route misses through `picker` instead of the process-wide one.
    pub fn with_picker(mut self, picker: Arc<dyn PeerPicker>) -> Self {
        self.picker = Some(picker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> GroupStats {
        self.metrics.snapshot()
    }

    /// Count one inbound request from another member.
    pub fn record_server_request(&self) {
        self.metrics.server_requests.inc();
    }

    fn picker(&self) -> Arc<dyn PeerPicker> {
        match &self.picker {
            Some(picker) => picker.clone(),
            None => peer_picker(),
        }
    }

    /// Fetch `key` into `sink`.
    pub async fn get(&self, ctx: CallContext, key: &str, sink: &mut dyn Sink) -> Result<()> {
        self.metrics.gets.inc();

        if let Some(value) = self.storage.get(key).await {
            self.metrics.cache_hits.inc();
            sink.set_bytes(value);
            return Ok(());
        }

        let value = self.load(ctx, key).await?;
        sink.set_bytes(value);
        Ok(())
    }

    async fn load(&self, ctx: CallContext, key: &str) -> Result<Bytes> {
        if let Some(peer) = self.picker().pick_peer(key) {
            match peer.get(ctx, &self.name, key).await {
                Ok(value) => {
                    self.metrics.peer_loads.inc();
                    return Ok(value);
                }
                Err(Error::Timeout) => {
                    self.metrics.peer_errors.inc();
                    return Err(Error::Timeout);
                }
                Err(e) => {
                    self.metrics.peer_errors.inc();
                    warn!(
                        group = %self.name,
                        key,
                        peer = peer.address(),
                        error = %e,
                        "Peer fetch failed, loading locally"
                    );
                }
            }
        }

        match ctx.run(self.getter.load(ctx, key)).await {
            Ok(value) => {
                self.metrics.local_loads.inc();
                self.storage.insert(key, value.clone()).await;
                Ok(value)
            }
            Err(Error::Timeout) => Err(Error::Timeout),
            Err(e @ Error::Load { .. }) => {
                self.metrics.local_load_errors.inc();
                Err(e)
            }
            Err(e) => {
                self.metrics.local_load_errors.inc();
                Err(Error::Load {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Remove `key` from this member only.
    pub async fn local_remove(&self, key: &str) {
        self.storage.invalidate(key).await;
        debug!(group = %self.name, key, "Removed key locally");
    }

    /// Remove `key` here and on every known peer.
    ///
    /// Every peer is attempted; the first peer failure is returned.
    pub async fn remove(&self, ctx: CallContext, key: &str) -> Result<()> {
        self.local_remove(key).await;

        let mut first_error = None;
        for peer in self.picker().all_peers() {
            if let Err(e) = peer.remove(ctx, &self.name, key).await {
                warn!(
                    group = %self.name,
                    key,
                    peer = peer.address(),
                    error = %e,
                    "Failed to remove key on peer"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether `key` is stored locally.
    pub fn contains_local(&self, key: &str) -> bool {
        self.storage.contains(key)
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .finish()
    }
}
