//! Moka cache wrapper for a group's local values.

use bytes::Bytes;
use moka::future::Cache;

/// Local storage for one group, bounded by the total size of keys and values.
pub struct GroupStorage {
    cache: Cache<String, Bytes>,
}

impl GroupStorage {
    /// Create storage holding at most `capacity_bytes` of keys plus values.
    pub fn new(capacity_bytes: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity_bytes)
            .weigher(|key: &String, value: &Bytes| {
                // Weight is key + value size in bytes, capped at u32::MAX
                let size = key.len() + value.len();
                size.min(u32::MAX as usize) as u32
            })
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.cache.get(key).await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub async fn insert(&self, key: &str, value: Bytes) {
        self.cache.insert(key.to_string(), value).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Approximate number of entries; exact after `run_pending_tasks`.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for GroupStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupStorage")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
