//! Local cache groups.
//!
//! A `Group` is a named, size-bounded local store plus a `Getter` that knows
//! how to produce missing values. Groups live in a `GroupRegistry`; inbound
//! peer requests resolve their target group through it.
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use peercache::cache::{GetterFn, GroupRegistry, StringSink};
//! use peercache::CallContext;
//! use std::sync::Arc;
//!
//! # async fn demo() -> peercache::Result<()> {
//! let group = GroupRegistry::global().new_group(
//!     "users",
//!     64 << 20,
//!     Arc::new(GetterFn(|key: &str| Ok(Bytes::from(format!("profile:{}", key))))),
//! )?;
//!
//! let mut sink = StringSink::new();
//! group.get(CallContext::background(), "alice", &mut sink).await?;
//! # Ok(())
//! # }
//! ```

mod group;
mod registry;
mod sink;
mod storage;

pub use group::{Getter, GetterFn, Group};
pub use registry::GroupRegistry;
pub use sink::{BytesSink, Sink, StringSink};
pub use storage::GroupStorage;
