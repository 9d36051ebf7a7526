//! Partitioning module for mapping keys to owning peers.
//!
//! This module implements consistent hashing for key distribution, ensuring:
//! - Identical ring state and key always yield the same owner
//! - Minimal key redistribution when peers join/leave
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    HashRing                           │
//! │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐   │
//! │  │ A:0 │→│ B:0 │→│ C:0 │→│ A:1 │→│ B:1 │→│ C:1 │   │
//! │  └─────┘ └─────┘ └─────┘ └─────┘ └─────┘ └─────┘   │
//! │        `replicas` virtual nodes per peer             │
//! └──────────────────────────────────────────────────────┘
//!
//!   key "user:123" → hash → next virtual node → peer B
//! ```

mod hashring;

pub use hashring::{default_hash, HashFn, HashRing};
