//! RFID card-match verification.

use crate::hardware::{RfidBridge, RfidError, TapEvent};
use crate::{AttemptPhase, IdentityVerifier};
use async_trait::async_trait;
use reclaim_types::{ClaimSession, FailureCode, VerificationOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// RFID verification against the card UID registered with the claim.
///
/// Waits for a tap on the push channel, falling back to the poll channel
/// when the push channel cannot be established. RFID is already the fallback
/// path, so a mismatched card terminates the session — there is nothing
/// further to fall back to.
pub struct RfidVerifier {
    bridge: Arc<dyn RfidBridge>,
    poll_timeout_secs: u64,
    cancelled: AtomicBool,
    phase: Mutex<AttemptPhase>,
}

impl RfidVerifier {
    pub fn new(bridge: Arc<dyn RfidBridge>, poll_timeout_secs: u64) -> Self {
        Self {
            bridge,
            poll_timeout_secs,
            cancelled: AtomicBool::new(false),
            phase: Mutex::new(AttemptPhase::Idle),
        }
    }

    fn set_phase(&self, phase: AttemptPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    fn finish(&self, phase: AttemptPhase, outcome: VerificationOutcome) -> VerificationOutcome {
        self.bridge.stop();
        self.set_phase(phase);
        outcome
    }

    /// One `wait for a card` call over the dual-channel bridge.
    async fn wait_for_card(&self) -> Result<String, FailureCode> {
        match self.bridge.subscribe().await {
            Ok(mut taps) => match taps.recv().await {
                Some(TapEvent::Card { uid }) => Ok(uid),
                Some(TapEvent::Fault { message }) => {
                    tracing::warn!(%message, "RFID reader fault");
                    Err(FailureCode::HardwareTimeout)
                }
                // Push channel dropped mid-wait — degrade to polling.
                None => {
                    tracing::debug!("RFID push channel closed, polling instead");
                    self.poll_for_card().await
                }
            },
            Err(RfidError::ChannelUnavailable(reason)) => {
                tracing::debug!(%reason, "RFID push channel unavailable, polling instead");
                self.poll_for_card().await
            }
            Err(RfidError::Hardware(reason)) => {
                tracing::warn!(%reason, "RFID hardware fault");
                Err(FailureCode::HardwareTimeout)
            }
        }
    }

    async fn poll_for_card(&self) -> Result<String, FailureCode> {
        match self.bridge.poll(self.poll_timeout_secs).await {
            Ok(Some(uid)) => Ok(uid),
            Ok(None) => Err(FailureCode::HardwareTimeout),
            Err(e) => {
                tracing::warn!(error = %e, "RFID poll failed");
                Err(FailureCode::HardwareTimeout)
            }
        }
    }
}

#[async_trait]
impl IdentityVerifier for RfidVerifier {
    fn name(&self) -> &'static str {
        "rfid"
    }

    async fn attempt(&self, session: &ClaimSession) -> VerificationOutcome {
        self.set_phase(AttemptPhase::Awaiting);

        let Some(stored_uid) = session.rfid_uid.as_deref() else {
            // Nothing registered to compare a tap against.
            return self.finish(
                AttemptPhase::HardwareError,
                VerificationOutcome::failure(FailureCode::IdentityFailed),
            );
        };

        if self.cancelled.load(Ordering::SeqCst) {
            return self.finish(
                AttemptPhase::TimedOut,
                VerificationOutcome::failure(FailureCode::HardwareTimeout),
            );
        }

        let uid = match self.wait_for_card().await {
            Ok(uid) => uid,
            Err(code) => {
                let phase = if code == FailureCode::HardwareTimeout {
                    AttemptPhase::TimedOut
                } else {
                    AttemptPhase::HardwareError
                };
                return self.finish(phase, VerificationOutcome::failure(code));
            }
        };

        if normalize_uid(&uid) == normalize_uid(stored_uid) {
            tracing::info!("RFID card matched");
            self.finish(AttemptPhase::Matched, VerificationOutcome::matched(0.0, 0.0))
        } else {
            tracing::info!("RFID card mismatch");
            self.finish(
                AttemptPhase::Mismatched,
                VerificationOutcome::unmatched(
                    reclaim_types::outcome::NO_SIMILARITY,
                    0.0,
                    Some(FailureCode::CardMismatch),
                ),
            )
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase == AttemptPhase::Awaiting {
                *phase = AttemptPhase::TimedOut;
            }
        }
        self.bridge.stop();
    }

    fn phase(&self) -> AttemptPhase {
        *self.phase.lock().unwrap()
    }
}

/// Normalize a card UID for comparison: strip all whitespace, ASCII
/// case-fold. Readers disagree on separator case and padding; the claim
/// store keeps whatever the registrar typed.
pub fn normalize_uid(uid: &str) -> String {
    uid.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// Tests live in `identity/tests/rfid.rs` — they use `reclaim-nullables`,
// which depends on this crate, so they must run as integration tests to
// avoid a second (mismatched) build of `reclaim-identity`.
