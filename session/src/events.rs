//! Events the orchestrator emits for the presentation layer.
//!
//! The kiosk UI is an external collaborator; it consumes this stream and
//! renders. Every terminal outcome produces a status line with a severity,
//! and recoverable outcomes are followed by countdown ticks — no path leaves
//! the kiosk silently stuck.

use reclaim_identity::FaceFeedback;
use reclaim_types::{FailureCode, SessionState, Severity};

#[derive(Clone, Debug, PartialEq)]
pub enum KioskEvent {
    StateChanged(SessionState),

    /// Claimant-facing terminal or progress message.
    StatusLine {
        severity: Severity,
        text: String,
    },

    /// Non-fatal notice (e.g. enrichment fetch failed, continuing with
    /// limited claim data).
    Notice(String),

    /// Actionable face-capture feedback between attempts.
    FaceFeedback(FaceFeedback),

    /// Countdown to the next scanning window.
    CountdownTick {
        remaining_secs: u64,
        immediate_switch: bool,
    },

    /// A manual retry action is available instead of an auto-restart.
    ManualRetryOffered {
        code: FailureCode,
    },

    /// The kiosk is scanning-ready again.
    ScanningResumed,
}
