//! Timestamp type used throughout the kiosk.
//!
//! Timestamps are Unix epoch seconds (UTC). Credential expiry is compared
//! against the kiosk's local clock; the claim service is the authority, the
//! local check only short-circuits obviously stale credentials.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this point in time lies strictly before `now`.
    pub fn is_past(&self, now: Timestamp) -> bool {
        self.0 < now.0
    }

    /// This timestamp shifted forward by `secs`.
    pub fn plus_secs(&self, secs: u64) -> Timestamp {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let later = Timestamp::new(100);
        assert_eq!(later.elapsed_since(Timestamp::new(40)), 0);
        assert_eq!(Timestamp::new(40).elapsed_since(later), 60);
    }

    #[test]
    fn is_past_is_strict() {
        let t = Timestamp::new(50);
        assert!(t.is_past(Timestamp::new(51)));
        assert!(!t.is_past(Timestamp::new(50)));
        assert!(!t.is_past(Timestamp::new(49)));
    }
}
