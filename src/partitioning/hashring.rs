//! Consistent hashing implementation with virtual nodes.
//!
//! Each peer address is placed on the ring `replicas` times. A key is owned by
//! the first virtual node at or after the key's hash, wrapping around. When
//! several peers land on the same position the smallest address owns it, so
//! ownership never depends on the order peers were added.

use std::collections::BTreeMap;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Hash function used to place peers and keys on the ring.
pub type HashFn = fn(&[u8]) -> u64;

/// xxHash64 with a zero seed.
pub fn default_hash(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// A consistent hash ring mapping keys to peer addresses.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Ring position to the peers placed there, sorted. The first one owns it.
    vnodes: BTreeMap<u64, Vec<String>>,

    /// Virtual nodes per peer.
    replicas: usize,

    hash_fn: HashFn,

    /// Physical peers in the ring, sorted.
    nodes: Vec<String>,
}

impl HashRing {
    /// Create a new empty ring.
    pub fn new(replicas: usize, hash_fn: HashFn) -> Self {
        Self {
            vnodes: BTreeMap::new(),
            replicas: replicas.max(1),
            hash_fn,
            nodes: Vec::new(),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Number of physical peers in the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.nodes.binary_search_by(|n| n.as_str().cmp(addr)).is_ok()
    }

    /// Add peers to the ring. Peers already present are ignored.
    pub fn add<I, S>(&mut self, addrs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for addr in addrs {
            self.add_node(addr.as_ref());
        }
    }

    /// Add one peer, creating `replicas` virtual nodes for it.
    pub fn add_node(&mut self, addr: &str) {
        let idx = match self.nodes.binary_search_by(|n| n.as_str().cmp(addr)) {
            Ok(_) => return,
            Err(idx) => idx,
        };
        self.nodes.insert(idx, addr.to_string());

        for i in 0..self.replicas {
            let hash = self.vnode_hash(addr, i);
            let slot = self.vnodes.entry(hash).or_default();
            if let Err(pos) = slot.binary_search_by(|n| n.as_str().cmp(addr)) {
                slot.insert(pos, addr.to_string());
            }
        }
    }

    /// Remove a peer and its virtual nodes.
    pub fn remove(&mut self, addr: &str) {
        let idx = match self.nodes.binary_search_by(|n| n.as_str().cmp(addr)) {
            Ok(idx) => idx,
            Err(_) => return,
        };
        self.nodes.remove(idx);

        for i in 0..self.replicas {
            let hash = self.vnode_hash(addr, i);
            let Some(slot) = self.vnodes.get_mut(&hash) else {
                continue;
            };
            if let Ok(pos) = slot.binary_search_by(|n| n.as_str().cmp(addr)) {
                slot.remove(pos);
            }
            // Positions shared with other peers stay with them.
            if slot.is_empty() {
                self.vnodes.remove(&hash);
            }
        }
    }

    /// Owner of `key`, or `None` if the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.vnodes.is_empty() {
            return None;
        }
        let hash = (self.hash_fn)(key.as_bytes());
        self.owner_at(hash)
    }

    fn owner_at(&self, hash: u64) -> Option<&str> {
        self.vnodes
            .range(hash..)
            .next()
            .or_else(|| self.vnodes.iter().next())
            .and_then(|(_, slot)| slot.first())
            .map(String::as_str)
    }

    fn vnode_hash(&self, addr: &str, i: usize) -> u64 {
        (self.hash_fn)(format!("{}:{}", addr, i).as_bytes())
    }

    /// Count of sample keys owned by each peer.
    ///
    /// Useful for testing/monitoring key distribution.
    pub fn get_distribution(
        &self,
        sample_size: usize,
    ) -> std::collections::HashMap<String, usize> {
        let mut distribution = std::collections::HashMap::new();

        for i in 0..sample_size {
            let key = format!("sample_key_{}", i);
            if let Some(owner) = self.get(&key) {
                *distribution.entry(owner.to_string()).or_insert(0) += 1;
            }
        }

        distribution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(addrs: &[&str]) -> HashRing {
        let mut ring = HashRing::new(50, default_hash);
        ring.add(addrs.iter().copied());
        ring
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new(50, default_hash);
        assert!(ring.is_empty());
        assert_eq!(ring.node_count(), 0);
        assert!(ring.get("key").is_none());
    }

    #[test]
    fn test_single_node() {
        let ring = ring_of(&["a:1"]);
        assert!(!ring.is_empty());
        assert_eq!(ring.get("key"), Some("a:1"));
        assert_eq!(ring.get("other"), Some("a:1"));
    }

    #[test]
    fn test_deterministic() {
        let first = ring_of(&["a:1", "b:1", "c:1"]);
        let second = ring_of(&["c:1", "a:1", "b:1"]);

        for i in 0..500 {
            let key = format!("k{}", i);
            assert_eq!(first.get(&key), second.get(&key));
        }
    }

    #[test]
    fn test_duplicate_add() {
        let ring = ring_of(&["a:1", "a:1"]);
        assert_eq!(ring.node_count(), 1);
    }

    #[test]
    fn test_add_remove_node() {
        let mut ring = ring_of(&["a:1", "b:1"]);
        assert!(ring.contains("a:1"));

        ring.remove("a:1");

        assert_eq!(ring.node_count(), 1);
        assert!(!ring.contains("a:1"));
        for i in 0..100 {
            assert_eq!(ring.get(&format!("k{}", i)), Some("b:1"));
        }

        ring.remove("b:1");
        assert!(ring.is_empty());
        assert!(ring.get("k").is_none());
    }

    #[test]
    fn test_remove_nonexistent() {
        let mut ring = ring_of(&["a:1"]);
        ring.remove("zzz:9");
        assert_eq!(ring.node_count(), 1);
    }

    #[test]
    fn test_minimal_remap_on_add() {
        let before = ring_of(&["a:1", "b:1", "c:1"]);
        let mut after = before.clone();
        after.add_node("d:1");

        for i in 0..2000 {
            let key = format!("k{}", i);
            let old = before.get(&key).unwrap();
            let new = after.get(&key).unwrap();
            // Keys only ever move to the new peer.
            assert!(old == new || new == "d:1", "key {} moved {} -> {}", key, old, new);
        }
    }

    #[test]
    fn test_distribution() {
        let mut ring = HashRing::new(200, default_hash);
        ring.add(["a:1", "b:1", "c:1"]);
        let distribution = ring.get_distribution(10000);

        for node in ring.nodes() {
            let count = distribution.get(node).copied().unwrap_or(0);
            assert!(count > 2000 && count < 4700, "Node {} has {} keys", node, count);
        }
    }

    /// Few distinct positions, so peers collide on most of them.
    fn coarse_hash(data: &[u8]) -> u64 {
        data.iter().map(|b| *b as u64).sum::<u64>() % 4
    }

    #[test]
    fn test_colliding_positions_ignore_add_order() {
        let mut ab = HashRing::new(8, coarse_hash);
        ab.add(["10.0.0.1:7000", "10.0.0.2:7000"]);
        let mut ba = HashRing::new(8, coarse_hash);
        ba.add(["10.0.0.2:7000", "10.0.0.1:7000"]);

        for i in 0..100 {
            let key = format!("k{}", i);
            assert_eq!(ab.get(&key), ba.get(&key), "owner of {} depends on add order", key);
        }
    }

    #[test]
    fn test_remove_keeps_colliding_positions() {
        for order in [["10.0.0.1:7000", "10.0.0.2:7000"], ["10.0.0.2:7000", "10.0.0.1:7000"]] {
            let mut ring = HashRing::new(8, coarse_hash);
            ring.add(order);

            ring.remove("10.0.0.2:7000");
            for i in 0..100 {
                assert_eq!(ring.get(&format!("k{}", i)), Some("10.0.0.1:7000"));
            }

            ring.add_node("10.0.0.2:7000");
            ring.remove("10.0.0.1:7000");
            for i in 0..100 {
                assert_eq!(ring.get(&format!("k{}", i)), Some("10.0.0.2:7000"));
            }
        }
    }

    #[test]
    fn test_custom_hash_fn() {
        fn zero(_: &[u8]) -> u64 {
            0
        }
        let mut ring = HashRing::new(3, zero);
        ring.add(["only:1"]);
        assert_eq!(ring.get("anything"), Some("only:1"));
    }
}
