//! Configuration types for the peer pool.

use crate::partitioning::{default_hash, HashFn};
use std::time::Duration;

/// Number of ring positions per peer when none is configured.
pub const DEFAULT_REPLICAS: usize = 50;

/// Largest frame accepted on a peer connection.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Main configuration for the peer pool.
///
/// Immutable once the pool is built.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Virtual nodes per peer on the hash ring. Zero means `DEFAULT_REPLICAS`.
    pub replicas: usize,

    /// Hash used to place peers and keys on the ring.
    pub hash_fn: HashFn,

    /// Options applied when dialing a peer.
    pub dial: DialOptions,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            hash_fn: default_hash,
            dial: DialOptions::default(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the virtual node count per peer.
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Set the ring hash function.
    pub fn with_hash_fn(mut self, hash_fn: HashFn) -> Self {
        self.hash_fn = hash_fn;
        self
    }

    /// Set the dial options.
    pub fn with_dial_options(mut self, dial: DialOptions) -> Self {
        self.dial = dial;
        self
    }

    /// Replace unset values with their defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.replicas == 0 {
            self.replicas = DEFAULT_REPLICAS;
        }
        self
    }
}

/// Transport options used when opening a connection to a peer.
///
/// The default is a plain, unencrypted TCP connection.
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Upper bound on the TCP handshake.
    pub connect_timeout: Duration,

    /// Disable Nagle's algorithm on the socket.
    pub nodelay: bool,

    /// Largest response frame accepted from the peer.
    pub max_frame_size: usize,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl DialOptions {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Set the maximum accepted frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}
