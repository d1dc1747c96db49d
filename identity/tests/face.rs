//! Facial-similarity verification tests.
//!
//! Integration tests (not an inline `#[cfg(test)]` module) so they share a
//! single build of `reclaim-identity` with `reclaim-nullables`, which
//! depends on it. See `tests/rfid.rs` for the full rationale.

use reclaim_identity::{AttemptPhase, FaceFeedback, FaceVerifier, IdentityVerifier};
use reclaim_nullables::{NullBackend, NullCamera};
use reclaim_types::{ClaimSession, FailureCode, Timestamp, VerificationMethod};
use std::sync::Arc;
use tokio::sync::mpsc;

fn face_session(embedding: Option<Vec<f32>>) -> ClaimSession {
    ClaimSession {
        claim_id: "C0001".into(),
        student_id: "1234567".into(),
        verification_method: VerificationMethod::Face,
        found_item_id: "ITEM-1".into(),
        locker_id: Some("L-01".into()),
        expires_at: Timestamp::EPOCH,
        face_embedding: embedding,
        rfid_uid: None,
    }
}

fn verifier(camera: NullCamera) -> FaceVerifier {
    FaceVerifier::new(
        Arc::new(camera),
        Arc::new(NullBackend::new()),
        0.6,
        3,
        None,
    )
}

#[tokio::test]
async fn matching_descriptor_succeeds_first_attempt() {
    let stored = vec![0.2f32, 0.4, 0.6];
    let camera = NullCamera::always_returning(stored.clone());
    let v = verifier(camera);

    let outcome = v.attempt(&face_session(Some(stored))).await;
    assert!(outcome.is_match());
    assert!(outcome.similarity.abs() < 1e-6);
    assert_eq!(v.phase(), AttemptPhase::Matched);
}

#[tokio::test]
async fn missing_embedding_fails_without_touching_the_camera() {
    let camera = NullCamera::always_returning(vec![1.0]);
    let v = verifier(camera);

    let outcome = v.attempt(&face_session(None)).await;
    assert_eq!(outcome.error, Some(FailureCode::NoFaceData));
    assert!(!outcome.success);
}

#[tokio::test]
async fn permission_denied_maps_to_camera_unavailable() {
    let v = verifier(NullCamera::denied());
    let outcome = v.attempt(&face_session(Some(vec![1.0, 0.0]))).await;
    assert_eq!(outcome.error, Some(FailureCode::CameraUnavailable));
    assert_eq!(v.phase(), AttemptPhase::HardwareError);
}

#[tokio::test]
async fn model_load_failure_maps_to_its_own_code() {
    let v = verifier(NullCamera::model_failure());
    let outcome = v.attempt(&face_session(Some(vec![1.0, 0.0]))).await;
    assert_eq!(outcome.error, Some(FailureCode::ModelLoadFailure));
}

#[tokio::test]
async fn retries_exhaust_into_a_non_fatal_unmatched_outcome() {
    // Orthogonal to the stored embedding: distance 1.0 every attempt.
    let camera = NullCamera::always_returning(vec![0.0f32, 1.0]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let v = FaceVerifier::new(
        Arc::new(camera),
        Arc::new(NullBackend::new()),
        0.6,
        3,
        Some(tx),
    );

    let outcome = v.attempt(&face_session(Some(vec![1.0f32, 0.0]))).await;
    assert!(outcome.success);
    assert!(!outcome.matched);
    assert!(outcome.error.is_none());
    assert_eq!(v.phase(), AttemptPhase::Mismatched);

    let mut mismatches = 0;
    while let Ok(f) = rx.try_recv() {
        if matches!(f, FaceFeedback::Mismatch { .. }) {
            mismatches += 1;
        }
    }
    assert_eq!(mismatches, 3);
}

#[tokio::test]
async fn empty_frames_emit_no_face_feedback() {
    let camera = NullCamera::no_face();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let v = FaceVerifier::new(
        Arc::new(camera),
        Arc::new(NullBackend::new()),
        0.6,
        2,
        Some(tx),
    );

    let outcome = v.attempt(&face_session(Some(vec![1.0f32, 0.0]))).await;
    assert!(outcome.success);
    assert!(!outcome.matched);

    assert_eq!(
        rx.try_recv().unwrap(),
        FaceFeedback::NoFaceFound { attempt: 1 }
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        FaceFeedback::NoFaceFound { attempt: 2 }
    );
}

#[tokio::test]
async fn dimension_mismatch_routes_through_the_server() {
    // Captured 2-dim vs stored 3-dim forces the server path.
    let camera = NullCamera::always_returning(vec![0.5f32, 0.5]);
    let backend = NullBackend::new().with_face_verdict(true, 0.9, 0.75);
    let v = FaceVerifier::new(Arc::new(camera), Arc::new(backend.clone()), 0.6, 3, None);

    let outcome = v.attempt(&face_session(Some(vec![0.1f32, 0.2, 0.3]))).await;
    assert!(outcome.is_match());
    // distance = 1 − 0.9, threshold = 1 − 0.75
    assert!((outcome.similarity - 0.1).abs() < 1e-9);
    assert!((outcome.threshold - 0.25).abs() < 1e-9);
    assert_eq!(backend.face_verify_calls(), 1);
}

#[tokio::test]
async fn cancel_stops_the_camera_and_is_idempotent() {
    let camera = NullCamera::always_returning(vec![1.0f32]);
    let v = verifier(camera.clone());
    v.cancel();
    v.cancel();
    assert_eq!(camera.stop_count(), 2);
}
