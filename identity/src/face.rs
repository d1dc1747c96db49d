//! Facial-similarity verification.

use crate::hardware::{Camera, CameraError};
use crate::{AttemptPhase, IdentityVerifier};
use async_trait::async_trait;
use reclaim_backend::{ClaimBackend, ServerFaceRequest};
use reclaim_similarity::{compare, SimilarityError, Verdict, MAX_COSINE_DISTANCE};
use reclaim_types::{ClaimSession, FailureCode, VerificationOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Actionable feedback shown between capture attempts.
#[derive(Clone, Debug, PartialEq)]
pub enum FaceFeedback {
    /// No face in the frame — prompt the claimant to step into view.
    NoFaceFound { attempt: u32 },
    /// A face was found but it does not match the registered embedding.
    Mismatch { attempt: u32, distance: f64 },
}

/// Face verification against the embedding registered with the claim.
///
/// Captures from the live camera stream, compares with the similarity
/// engine, retries up to `max_attempts` inside the orchestrator's timeout
/// window, and routes embedding dimension mismatches through the
/// server-side comparison endpoint.
pub struct FaceVerifier {
    camera: Arc<dyn Camera>,
    backend: Arc<dyn ClaimBackend>,
    threshold: f64,
    max_attempts: u32,
    feedback: Option<mpsc::UnboundedSender<FaceFeedback>>,
    cancelled: AtomicBool,
    phase: Mutex<AttemptPhase>,
}

impl FaceVerifier {
    pub fn new(
        camera: Arc<dyn Camera>,
        backend: Arc<dyn ClaimBackend>,
        threshold: f64,
        max_attempts: u32,
        feedback: Option<mpsc::UnboundedSender<FaceFeedback>>,
    ) -> Self {
        Self {
            camera,
            backend,
            threshold,
            max_attempts,
            feedback,
            cancelled: AtomicBool::new(false),
            phase: Mutex::new(AttemptPhase::Idle),
        }
    }

    fn set_phase(&self, phase: AttemptPhase) {
        *self.phase.lock().unwrap() = phase;
    }

    fn emit(&self, feedback: FaceFeedback) {
        if let Some(tx) = &self.feedback {
            let _ = tx.send(feedback);
        }
    }

    fn finish(&self, phase: AttemptPhase, outcome: VerificationOutcome) -> VerificationOutcome {
        self.camera.stop();
        self.set_phase(phase);
        outcome
    }

    fn classify_camera_error(error: &CameraError) -> FailureCode {
        match error {
            CameraError::PermissionDenied => FailureCode::CameraUnavailable,
            CameraError::ModelLoad(_) => FailureCode::ModelLoadFailure,
            CameraError::Disconnected(_) | CameraError::Other(_) => FailureCode::CameraUnavailable,
        }
    }

    /// Registration and kiosk capture ran different extractor versions; the
    /// server owns the comparison. Its score converts back into the uniform
    /// lower-is-better contract so the caller sees one numeric convention.
    async fn server_fallback(
        &self,
        session: &ClaimSession,
        stored: &[f32],
    ) -> VerificationOutcome {
        let frame = match self.camera.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame capture for server comparison failed");
                return VerificationOutcome::failure(Self::classify_camera_error(&e));
            }
        };

        let request = ServerFaceRequest {
            claim_id: session.claim_id.clone(),
            face_image: frame,
            stored_embedding: stored.to_vec(),
        };
        match self.backend.face_verify(request).await {
            Ok(verdict) => {
                let converted = Verdict::from_server_score(verdict.score, verdict.threshold);
                tracing::info!(
                    matched = converted.matched,
                    distance = converted.distance,
                    "server-side face comparison completed"
                );
                if converted.matched {
                    VerificationOutcome::matched(converted.distance, converted.threshold)
                } else {
                    VerificationOutcome::unmatched(converted.distance, converted.threshold, None)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "server-side face comparison failed");
                VerificationOutcome::failure(FailureCode::IdentityFailed)
            }
        }
    }
}

#[async_trait]
impl IdentityVerifier for FaceVerifier {
    fn name(&self) -> &'static str {
        "face"
    }

    async fn attempt(&self, session: &ClaimSession) -> VerificationOutcome {
        self.set_phase(AttemptPhase::Awaiting);

        let Some(stored) = session.face_embedding.as_deref() else {
            return self.finish(
                AttemptPhase::HardwareError,
                VerificationOutcome::failure(FailureCode::NoFaceData),
            );
        };

        if let Err(e) = self.camera.start().await {
            tracing::warn!(error = %e, "camera start failed");
            return self.finish(
                AttemptPhase::HardwareError,
                VerificationOutcome::failure(Self::classify_camera_error(&e)),
            );
        }

        let mut last_verdict: Option<Verdict> = None;
        for attempt in 1..=self.max_attempts {
            if self.cancelled.load(Ordering::SeqCst) {
                return self.finish(
                    AttemptPhase::TimedOut,
                    VerificationOutcome::failure(FailureCode::HardwareTimeout),
                );
            }

            match self.camera.capture_descriptor().await {
                Ok(Some(captured)) => match compare(&captured, stored, self.threshold) {
                    Ok(verdict) if verdict.matched => {
                        tracing::info!(attempt, distance = verdict.distance, "face matched");
                        return self.finish(
                            AttemptPhase::Matched,
                            VerificationOutcome::matched(verdict.distance, verdict.threshold),
                        );
                    }
                    Ok(verdict) => {
                        tracing::debug!(attempt, distance = verdict.distance, "face mismatch");
                        self.emit(FaceFeedback::Mismatch {
                            attempt,
                            distance: verdict.distance,
                        });
                        last_verdict = Some(verdict);
                    }
                    Err(SimilarityError::DimensionMismatch {
                        captured: captured_len,
                        stored: stored_len,
                    }) => {
                        tracing::info!(
                            captured_len,
                            stored_len,
                            "embedding dimension mismatch, using server comparison"
                        );
                        let outcome = self.server_fallback(session, stored).await;
                        let phase = phase_for(&outcome);
                        return self.finish(phase, outcome);
                    }
                    Err(SimilarityError::Empty) => {
                        return self.finish(
                            AttemptPhase::HardwareError,
                            VerificationOutcome::failure(FailureCode::NoFaceData),
                        );
                    }
                },
                Ok(None) => {
                    tracing::debug!(attempt, "no face found in frame");
                    self.emit(FaceFeedback::NoFaceFound { attempt });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "descriptor capture failed");
                    return self.finish(
                        AttemptPhase::HardwareError,
                        VerificationOutcome::failure(Self::classify_camera_error(&e)),
                    );
                }
            }
        }

        // Retries exhausted without a match — a non-fatal outcome; whether
        // this falls back to RFID or terminates the session is the
        // orchestrator's call.
        let (distance, threshold) = match last_verdict {
            Some(v) => (v.distance, v.threshold),
            None => (MAX_COSINE_DISTANCE, self.threshold),
        };
        self.finish(
            AttemptPhase::Mismatched,
            VerificationOutcome::unmatched(distance, threshold, None),
        )
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase == AttemptPhase::Awaiting {
                *phase = AttemptPhase::TimedOut;
            }
        }
        self.camera.stop();
    }

    fn phase(&self) -> AttemptPhase {
        *self.phase.lock().unwrap()
    }
}

fn phase_for(outcome: &VerificationOutcome) -> AttemptPhase {
    if outcome.is_match() {
        AttemptPhase::Matched
    } else if outcome.success {
        AttemptPhase::Mismatched
    } else {
        AttemptPhase::HardwareError
    }
}

// Tests live in `identity/tests/face.rs` — they use `reclaim-nullables`,
// which depends on this crate, so they must run as integration tests to
// avoid a second (mismatched) build of `reclaim-identity`.
