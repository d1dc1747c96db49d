//! The orchestrator's session state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one claimant interaction.
///
/// ```text
/// Idle → Scanning → Detected → VerifyingCredential → AwaitingIdentity
///      → Unlocking → Success ─┐
///                    Failed ──┼→ AutoRestarting → Scanning
///                             └→ Scanning (immediate switch)
/// ```
///
/// `AutoRestarting` is a timed sub-state that always returns to `Scanning`.
/// `Failed → VerifyingCredential` and `Failed → Unlocking` are the manual
/// retry edges (offline probe, failed finalize).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Process started, scanning not yet armed.
    Idle,
    /// Waiting for a QR detection event.
    Scanning,
    /// A scan arrived and passed the in-flight guard.
    Detected,
    /// Checking the credential against the claim service.
    VerifyingCredential,
    /// An identity verifier owns the camera or RFID channel.
    AwaitingIdentity,
    /// Locker release or staff-handoff finalize in progress.
    Unlocking,
    Success,
    Failed,
    /// Countdown to the next scanning window.
    AutoRestarting,
}

impl SessionState {
    /// The transition table. Anything not listed is a bug in the caller.
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Scanning)
                | (Scanning, Detected)
                | (Detected, VerifyingCredential)
                | (Detected, Failed)
                | (VerifyingCredential, AwaitingIdentity)
                | (VerifyingCredential, Failed)
                | (AwaitingIdentity, Unlocking)
                | (AwaitingIdentity, Failed)
                | (Unlocking, Success)
                | (Unlocking, Failed)
                | (Success, AutoRestarting)
                | (Failed, AutoRestarting)
                | (Failed, Scanning)
                | (Failed, VerifyingCredential)
                | (Failed, Unlocking)
                | (AutoRestarting, Scanning)
        )
    }

    /// Terminal outcomes of a session (before the restart countdown).
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Success | SessionState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Detected => "detected",
            SessionState::VerifyingCredential => "verifying_credential",
            SessionState::AwaitingIdentity => "awaiting_identity",
            SessionState::Unlocking => "unlocking",
            SessionState::Success => "success",
            SessionState::Failed => "failed",
            SessionState::AutoRestarting => "auto_restarting",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
