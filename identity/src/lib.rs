//! Pluggable identity verification.
//!
//! A claim proves identity through one of two interchangeable methods: facial
//! similarity or RFID card match. Both implement [`IdentityVerifier`] —
//! attempt once, report a [`VerificationOutcome`], and stop hardware
//! immediately on [`cancel`]. The orchestrator selects the variant from the
//! claim's verification method and owns the fallback decision (face
//! exhaustion re-dispatches to RFID when the claim carries a card UID).
//!
//! [`cancel`]: IdentityVerifier::cancel

pub mod face;
pub mod hardware;
pub mod rfid;

use async_trait::async_trait;
use reclaim_types::{ClaimSession, VerificationOutcome};

pub use face::{FaceFeedback, FaceVerifier};
pub use hardware::{Camera, CameraError, RfidBridge, RfidError, TapEvent};
pub use rfid::{normalize_uid, RfidVerifier};

/// Hard ceiling on one verification attempt, either variant. The
/// orchestrator enforces it with the scheduler's timeout race.
pub const VERIFY_TIMEOUT_SECS: u64 = 60;

/// Progress of one verification attempt.
///
/// `Idle → Awaiting → { Matched | Mismatched | TimedOut | HardwareError }`.
/// All four end states are terminal for the attempt; only a face mismatch
/// after retries feeds the orchestrator's RFID fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptPhase {
    Idle,
    Awaiting,
    Matched,
    Mismatched,
    TimedOut,
    HardwareError,
}

/// A pluggable identity-verification method.
///
/// Implementations hold the hardware they drive and must release it before
/// reporting any outcome: the camera and the RFID channel are single-owner
/// resources, and ownership only transfers after an explicit stop.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Human-readable name of this method.
    fn name(&self) -> &'static str;

    /// Run one verification attempt against the session's registered data.
    ///
    /// The session is read-only here — verifiers report outcomes, the
    /// orchestrator owns all session mutation.
    async fn attempt(&self, session: &ClaimSession) -> VerificationOutcome;

    /// Stop camera/hardware access immediately. Idempotent; safe to call
    /// whether or not an attempt is in flight.
    fn cancel(&self);

    /// Where the current (or last) attempt stands.
    fn phase(&self) -> AttemptPhase;
}
