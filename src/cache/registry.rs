//! Lookup of local cache groups by name.

use crate::cache::group::{Getter, Group};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

static GLOBAL_REGISTRY: Lazy<Arc<GroupRegistry>> = Lazy::new(|| Arc::new(GroupRegistry::new()));

/// Maps group names to local cache groups.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<GroupRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Create and register a group. Names must be unique.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        capacity_bytes: u64,
        getter: Arc<dyn Getter>,
    ) -> Result<Arc<Group>> {
        self.register(Group::new(name, capacity_bytes, getter))
    }

    /// Register an already-built group. Names must be unique.
    pub fn register(&self, group: Group) -> Result<Arc<Group>> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(Error::Config(format!(
                "duplicate registration of group [{}]",
                group.name()
            )));
        }

        let group = Arc::new(group);
        groups.insert(group.name().to_string(), group.clone());
        info!(group = %group.name(), "Registered cache group");
        Ok(group)
    }

    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }
}
