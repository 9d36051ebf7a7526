//! Core types used throughout the peer cache.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Caller-supplied deadline for a remote or local cache call.
///
/// The pool never imposes its own timeout; whatever deadline the caller sets
/// here bounds the local work and is forwarded to the remote peer as a
/// remaining-time budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Rebuild a context from a budget received over the wire.
    pub fn from_budget_ms(budget_ms: Option<u64>) -> Self {
        match budget_ms {
            Some(ms) => Self::with_timeout(Duration::from_millis(ms)),
            None => Self::background(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Remaining budget in milliseconds, as sent on the wire.
    pub fn budget_ms(&self) -> Option<u64> {
        self.remaining().map(|r| r.as_millis() as u64)
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Run `fut` bounded by this context's deadline.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| Error::Timeout)?,
            None => fut.await,
        }
    }
}

/// Point-in-time copy of a group's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Every `get` call, local or inbound.
    pub gets: u64,
    /// Hits served from the local store.
    pub cache_hits: u64,
    /// Values fetched from a remote owner.
    pub peer_loads: u64,
    /// Remote fetches that failed.
    pub peer_errors: u64,
    /// Values produced by the local getter.
    pub local_loads: u64,
    /// Local getter failures.
    pub local_load_errors: u64,
    /// Inbound Retrieve/Delete requests from other members.
    pub server_requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context_has_no_deadline() {
        let ctx = CallContext::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(ctx.budget_ms().is_none());
        assert!(!ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_expires() {
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        assert!(!ctx.is_expired());
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.budget_ms(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let result: Result<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_run_without_deadline_passes_through() {
        let ctx = CallContext::background();
        let value = ctx.run(async { Ok(7u32) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
