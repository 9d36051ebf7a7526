//! Per-group request counters.
//!
//! Every local cache group carries a `GroupMetrics` instance. The counters are
//! plain relaxed atomics; `snapshot` copies them into a `GroupStats`.

mod counters;

pub use counters::Counter;

use crate::types::GroupStats;

/// Counters kept for one cache group.
#[derive(Debug)]
pub struct GroupMetrics {
    pub gets: Counter,
    pub cache_hits: Counter,
    pub peer_loads: Counter,
    pub peer_errors: Counter,
    pub local_loads: Counter,
    pub local_load_errors: Counter,
    /// Incremented once per inbound request from another member.
    pub server_requests: Counter,
}

impl GroupMetrics {
    pub const fn new() -> Self {
        Self {
            gets: Counter::new("gets"),
            cache_hits: Counter::new("cache_hits"),
            peer_loads: Counter::new("peer_loads"),
            peer_errors: Counter::new("peer_errors"),
            local_loads: Counter::new("local_loads"),
            local_load_errors: Counter::new("local_load_errors"),
            server_requests: Counter::new("server_requests"),
        }
    }

    pub fn snapshot(&self) -> GroupStats {
        GroupStats {
            gets: self.gets.get(),
            cache_hits: self.cache_hits.get(),
            peer_loads: self.peer_loads.get(),
            peer_errors: self.peer_errors.get(),
            local_loads: self.local_loads.get(),
            local_load_errors: self.local_load_errors.get(),
            server_requests: self.server_requests.get(),
        }
    }
}

impl Default for GroupMetrics {
    fn default() -> Self {
        Self::new()
    }
}
