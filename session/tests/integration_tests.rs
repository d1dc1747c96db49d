//! Integration tests exercising the full claim pipeline:
//! scan → credential verify → identity verification → locker release →
//! auto-recovery.
//!
//! These tests wire together components that are normally only connected
//! inside the daemon, verifying the system works end-to-end — not just
//! in isolation.

use std::sync::Arc;

use reclaim_identity::TapEvent;
use reclaim_nullables::{NullBackend, NullCamera, NullRfidBridge};
use reclaim_session::{ClaimOrchestrator, KioskConfig, KioskEvent, KioskMetrics, ScanDisposition};
use reclaim_types::{FailureCode, SessionState, Severity};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const FACE_CREDENTIAL: &str = "QRC|C0001|1234567|face";
const RFID_CREDENTIAL: &str = "QRC|C0002|7654321|rfid";

fn kiosk(
    backend: NullBackend,
    camera: NullCamera,
    rfid: NullRfidBridge,
) -> (
    Arc<ClaimOrchestrator>,
    mpsc::UnboundedReceiver<KioskEvent>,
    Arc<KioskMetrics>,
) {
    let metrics = Arc::new(KioskMetrics::new());
    let (orchestrator, events) = ClaimOrchestrator::new(
        KioskConfig::default(),
        Arc::new(backend),
        Arc::new(camera),
        Arc::new(rfid),
        Arc::clone(&metrics),
    );
    orchestrator.start();
    (orchestrator, events, metrics)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<KioskEvent>) -> Vec<KioskEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn reached(events: &[KioskEvent], state: SessionState) -> bool {
    events.contains(&KioskEvent::StateChanged(state))
}

// A unit vector at cosine distance 0.8 from `[1, 0]`.
fn far_descriptor() -> Vec<f32> {
    vec![0.2, (1.0f32 - 0.04).sqrt()]
}

// ---------------------------------------------------------------------------
// 1. Face match releases the locker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn face_match_ends_in_success_with_one_locker_open() {
    let stored = vec![0.3f32, 0.4, 0.5];
    let backend = NullBackend::new().with_grant(NullBackend::face_grant(stored.clone(), None));
    let (orchestrator, mut events, metrics) = kiosk(
        backend.clone(),
        NullCamera::always_returning(stored),
        NullRfidBridge::with_taps(vec![]),
    );

    let disposition = orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;
    assert_eq!(disposition, ScanDisposition::Accepted);

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Success));
    assert_eq!(backend.locker_open_calls(), 1);
    assert_eq!(metrics.successes.get(), 1);
    assert_eq!(metrics.failures.get(), 0);

    // Session populated from the grant, never mutated afterwards.
    // (It is still retained until the success countdown finishes.)
    let session = orchestrator.active_session().expect("session retained");
    assert_eq!(session.claim_id, "C0001");
    assert_eq!(session.student_id, "1234567");
}

// ---------------------------------------------------------------------------
// 2. Face mismatch without an RFID fallback is IDENTITY_FAILED
// ---------------------------------------------------------------------------

#[tokio::test]
async fn face_mismatch_without_rfid_fails_identity_and_never_opens_the_locker() {
    let backend = NullBackend::new().with_grant(NullBackend::face_grant(vec![1.0, 0.0], None));
    let camera = NullCamera::always_returning(far_descriptor());
    let (orchestrator, mut events, metrics) =
        kiosk(backend.clone(), camera.clone(), NullRfidBridge::with_taps(vec![]));

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Failed));
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::StatusLine { severity: Severity::Error, text }
            if text.contains("couldn't verify")
    )));

    // All three capture attempts ran, then the kiosk went straight back to
    // scanning (immediate switch) while the grace countdown runs.
    assert_eq!(camera.capture_count(), 3);
    assert_eq!(orchestrator.current_state(), SessionState::Scanning);
    assert_eq!(backend.locker_open_calls(), 0);
    assert_eq!(metrics.failures.get(), 1);
    assert_eq!(metrics.fallbacks.get(), 0);
}

// ---------------------------------------------------------------------------
// 3. Face exhaustion falls back to RFID and succeeds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn face_exhaustion_with_matching_card_succeeds_via_rfid_fallback() {
    let backend =
        NullBackend::new().with_grant(NullBackend::face_grant(vec![1.0, 0.0], Some("AB-12")));
    let camera = NullCamera::always_returning(far_descriptor());
    let rfid = NullRfidBridge::with_taps(vec![TapEvent::Card {
        uid: " ab-12 ".into(),
    }]);
    let (orchestrator, mut events, metrics) = kiosk(backend.clone(), camera, rfid);

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Success));
    assert!(
        events.iter().any(|e| matches!(e, KioskEvent::Notice(text) if text.contains("card"))),
        "fallback should tell the claimant to tap their card"
    );
    assert_eq!(backend.locker_open_calls(), 1, "exactly one locker open");
    assert_eq!(metrics.fallbacks.get(), 1);
    assert_eq!(metrics.successes.get(), 1);
}

// ---------------------------------------------------------------------------
// 4. Offline probe short-circuits before any backend call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_probe_fails_with_manual_retry_and_zero_backend_calls() {
    let backend = NullBackend::new()
        .with_probe(false)
        .with_grant(NullBackend::face_grant(vec![1.0], None));
    let (orchestrator, mut events, metrics) = kiosk(
        backend.clone(),
        NullCamera::always_returning(vec![1.0]),
        NullRfidBridge::with_taps(vec![]),
    );

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;

    assert_eq!(orchestrator.current_state(), SessionState::Failed);
    assert_eq!(backend.probe_calls(), 1);
    assert_eq!(backend.verify_calls(), 0, "no backend call past the probe");
    assert_eq!(backend.locker_open_calls(), 0);
    assert_eq!(metrics.network_errors.get(), 1);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::ManualRetryOffered {
            code: FailureCode::NetworkOffline
        }
    )));
    // No countdown for offline failures — a blind restart would just fail
    // the same way.
    assert!(!events
        .iter()
        .any(|e| matches!(e, KioskEvent::CountdownTick { .. })));
}

#[tokio::test]
async fn manual_retry_after_connectivity_returns_runs_the_full_flow() {
    let stored = vec![0.5f32, 0.5];
    let backend = NullBackend::new()
        .with_probe(false)
        .with_grant(NullBackend::face_grant(stored.clone(), None));
    let (orchestrator, mut events, _metrics) = kiosk(
        backend.clone(),
        NullCamera::always_returning(stored),
        NullRfidBridge::with_taps(vec![]),
    );

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;
    assert_eq!(orchestrator.current_state(), SessionState::Failed);

    backend.set_probe(true);
    let disposition = orchestrator.retry_manual().await;
    assert_eq!(disposition, ScanDisposition::Accepted);

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Success));
    assert_eq!(backend.verify_calls(), 1);
    assert_eq!(backend.locker_open_calls(), 1);
}

// ---------------------------------------------------------------------------
// 5. RFID-method claims
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rfid_method_claim_matches_normalized_uid() {
    let backend = NullBackend::new().with_grant(NullBackend::rfid_grant("AB-12"));
    let rfid = NullRfidBridge::with_taps(vec![TapEvent::Card {
        uid: " ab-12 ".into(),
    }]);
    let (orchestrator, mut events, _metrics) =
        kiosk(backend.clone(), NullCamera::no_face(), rfid);

    orchestrator.on_credential_scanned(RFID_CREDENTIAL).await;

    assert!(reached(&drain(&mut events), SessionState::Success));
    assert_eq!(backend.locker_open_calls(), 1);
}

#[tokio::test]
async fn rfid_card_mismatch_is_terminal_with_no_further_fallback() {
    let backend = NullBackend::new().with_grant(NullBackend::rfid_grant("AB-12"));
    let rfid = NullRfidBridge::with_taps(vec![TapEvent::Card { uid: "ZZ-99".into() }]);
    let (orchestrator, mut events, metrics) =
        kiosk(backend.clone(), NullCamera::no_face(), rfid);

    orchestrator.on_credential_scanned(RFID_CREDENTIAL).await;

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Failed));
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::StatusLine { text, .. } if text.contains("doesn't match")
    )));
    assert_eq!(backend.locker_open_calls(), 0);
    assert_eq!(metrics.failures.get(), 1);
}

#[tokio::test]
async fn rfid_push_refusal_degrades_to_the_poll_channel() {
    let backend = NullBackend::new().with_grant(NullBackend::rfid_grant("04A3F1"));
    let rfid = NullRfidBridge::push_unavailable_with_poll(Some("04a3f1".into()));
    let (orchestrator, mut events, _metrics) =
        kiosk(backend.clone(), NullCamera::no_face(), rfid.clone());

    orchestrator.on_credential_scanned(RFID_CREDENTIAL).await;

    assert!(reached(&drain(&mut events), SessionState::Success));
    assert_eq!(rfid.subscribe_count(), 1);
    assert_eq!(rfid.poll_count(), 1);
}

// ---------------------------------------------------------------------------
// 6. Staff handoff (no locker on the claim)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claim_without_a_locker_takes_the_staff_handoff_path() {
    let stored = vec![0.7f32, 0.1];
    let mut grant = NullBackend::face_grant(stored.clone(), None);
    grant.locker_id = None;
    let backend = NullBackend::new().with_grant(grant);
    let (orchestrator, mut events, _metrics) = kiosk(
        backend.clone(),
        NullCamera::always_returning(stored),
        NullRfidBridge::with_taps(vec![]),
    );

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Success));
    assert_eq!(backend.locker_open_calls(), 0);
    assert_eq!(backend.finalize_calls(), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        KioskEvent::StatusLine { text, .. } if text.contains("service desk")
    )));
}

// ---------------------------------------------------------------------------
// 7. Camera preconditions still honor the RFID fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn camera_denial_with_rfid_available_still_verifies() {
    let backend =
        NullBackend::new().with_grant(NullBackend::face_grant(vec![1.0, 0.0], Some("AB-12")));
    let rfid = NullRfidBridge::with_taps(vec![TapEvent::Card { uid: "AB-12".into() }]);
    let (orchestrator, mut events, metrics) = kiosk(backend.clone(), NullCamera::denied(), rfid);

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;

    assert!(reached(&drain(&mut events), SessionState::Success));
    assert_eq!(metrics.fallbacks.get(), 1);
    assert_eq!(backend.locker_open_calls(), 1);
}

#[tokio::test]
async fn camera_denial_without_rfid_is_camera_unavailable() {
    let backend = NullBackend::new().with_grant(NullBackend::face_grant(vec![1.0, 0.0], None));
    let (orchestrator, mut events, metrics) = kiosk(
        backend.clone(),
        NullCamera::denied(),
        NullRfidBridge::with_taps(vec![]),
    );

    orchestrator.on_credential_scanned(FACE_CREDENTIAL).await;

    let events = drain(&mut events);
    assert!(reached(&events, SessionState::Failed));
    assert_eq!(metrics.permission_errors.get(), 1);
    assert_eq!(backend.locker_open_calls(), 0);
}
