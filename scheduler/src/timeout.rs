//! Timeout races around hardware and network operations.

use std::future::Future;
use std::time::Duration;

/// Result of racing an operation against a timer.
#[derive(Debug, PartialEq, Eq)]
pub enum Raced<T> {
    Completed(T),
    /// The timer won. Cleanup has already run.
    Expired,
}

impl<T> Raced<T> {
    pub fn expired(&self) -> bool {
        matches!(self, Raced::Expired)
    }
}

/// Race `operation` against a timer.
///
/// On timeout, `cleanup` runs (stop camera/hardware, release resources)
/// before the expiry is reported, so the operation's own completion can no
/// longer race in. If the operation settles first the cleanup never runs —
/// callers that need an unconditional stop call it themselves afterwards;
/// stop is idempotent everywhere in this system.
pub async fn run_with_timeout<T, F, C, Fut>(operation: F, duration: Duration, cleanup: C) -> Raced<T>
where
    F: Future<Output = T>,
    C: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::select! {
        out = operation => Raced::Completed(out),
        _ = tokio::time::sleep(duration) => {
            tracing::debug!(timeout_ms = duration.as_millis() as u64, "operation timed out");
            cleanup().await;
            Raced::Expired
        }
    }
}
