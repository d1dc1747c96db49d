//! The result of one identity-check attempt.

use crate::failure::FailureCode;
use serde::{Deserialize, Serialize};

/// Result of one identity-verification attempt, produced by the active
/// verifier and consumed by the orchestrator to decide retry, fallback, or
/// terminal transition.
///
/// `similarity` follows the uniform lower-is-better distance convention
/// regardless of which comparison path produced it. For RFID attempts the
/// numeric fields are degenerate (0 on match, the sentinel on mismatch).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// The attempt itself completed (hardware worked, comparison ran).
    pub success: bool,
    /// The identity matched. Meaningful only when `success` is true.
    pub matched: bool,
    /// Similarity distance, lower = more similar.
    pub similarity: f64,
    pub threshold: f64,
    /// Failure classification when the attempt could not complete, or a
    /// definite terminal code (e.g. a card mismatch).
    pub error: Option<FailureCode>,
}

/// Distance sentinel for outcomes with no meaningful comparison.
pub const NO_SIMILARITY: f64 = f64::INFINITY;

impl VerificationOutcome {
    pub fn matched(similarity: f64, threshold: f64) -> Self {
        Self {
            success: true,
            matched: true,
            similarity,
            threshold,
            error: None,
        }
    }

    /// Attempt completed but the identity did not match. `error` is set when
    /// the mismatch is itself terminal (RFID card mismatch); `None` leaves
    /// the fallback decision to the orchestrator.
    pub fn unmatched(similarity: f64, threshold: f64, error: Option<FailureCode>) -> Self {
        Self {
            success: true,
            matched: false,
            similarity,
            threshold,
            error,
        }
    }

    /// Attempt could not complete at all.
    pub fn failure(code: FailureCode) -> Self {
        Self {
            success: false,
            matched: false,
            similarity: NO_SIMILARITY,
            threshold: 0.0,
            error: Some(code),
        }
    }

    pub fn is_match(&self) -> bool {
        self.success && self.matched
    }
}
