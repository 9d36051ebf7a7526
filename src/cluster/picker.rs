//! Process-wide peer selection.
//!
//! Cache groups do not hold a reference to the peer pool. They ask whichever
//! `PeerPicker` was registered for the process, falling back to `NoPeers`
//! (always serve locally) when nothing has been registered yet.

use crate::error::{Error, Result};
use crate::types::CallContext;
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// A remote member that can serve fetches and invalidations.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Address of the remote member.
    fn address(&self) -> &str;

    /// Fetch `key` from `group` on the remote member.
    async fn get(&self, ctx: CallContext, group: &str, key: &str) -> Result<Bytes>;

    /// Remove `key` from `group` on the remote member.
    async fn remove(&self, ctx: CallContext, group: &str, key: &str) -> Result<()>;
}

/// Chooses the member owning a key.
pub trait PeerPicker: Send + Sync {
    /// The remote owner of `key`, or `None` when the key must be served locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;

    /// Every remote member currently known.
    fn all_peers(&self) -> Vec<Arc<dyn PeerGetter>>;
}

/// Picker used when no pool is registered: everything is local.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        None
    }

    fn all_peers(&self) -> Vec<Arc<dyn PeerGetter>> {
        Vec::new()
    }
}

static PEER_PICKER: OnceCell<Arc<dyn PeerPicker>> = OnceCell::new();

/// Register the process-wide peer picker. Fails if one is already registered.
pub fn register_peer_picker(picker: Arc<dyn PeerPicker>) -> Result<()> {
    PEER_PICKER
        .set(picker)
        .map_err(|_| Error::Config("peer picker already registered".to_string()))
}

/// The registered peer picker, or `NoPeers`.
pub fn peer_picker() -> Arc<dyn PeerPicker> {
    match PEER_PICKER.get() {
        Some(picker) => picker.clone(),
        None => Arc::new(NoPeers),
    }
}
