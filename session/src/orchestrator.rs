//! The claim session orchestrator.
//!
//! Owns the session state machine and the single active [`ClaimSession`].
//! Stages run strictly in order — credential → identity → finalize — with
//! every stage-level failure caught here, classified into a [`FailureCode`],
//! and routed to exactly one of: terminal failure with auto-restart, a
//! non-fatal notice with continuation, or fallback to the alternate identity
//! method. No non-terminal state persists without a bounded wait.

use crate::config::KioskConfig;
use crate::events::KioskEvent;
use crate::metrics::KioskMetrics;
use reclaim_backend::{ClaimBackend, LockerOpenRequest};
use reclaim_identity::{Camera, FaceVerifier, IdentityVerifier, RfidBridge, RfidVerifier};
use reclaim_scheduler::{
    run_with_timeout, CountdownEvent, Raced, RestartPlan, RestartScheduler,
};
use reclaim_types::{
    ClaimSession, FailureCode, Recovery, ScanResult, SessionState, Severity, Timestamp,
    VerificationMethod, VerificationOutcome,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

/// What happened to a scan event at the in-flight guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanDisposition {
    Accepted,
    /// A session was already in flight (or the kiosk was not scanning);
    /// the event was dropped.
    Ignored,
}

/// The blocked action a manual retry re-runs.
#[derive(Clone, Debug)]
enum RetryAction {
    /// Re-run the whole credential flow from the connectivity probe.
    Probe { raw_text: String },
    /// Re-run locker release / staff finalize on the retained session.
    Finalize,
}

/// Top-level kiosk state machine. Single instance, single active session.
pub struct ClaimOrchestrator {
    config: KioskConfig,
    backend: Arc<dyn ClaimBackend>,
    camera: Arc<dyn Camera>,
    rfid: Arc<dyn RfidBridge>,
    metrics: Arc<KioskMetrics>,
    events: mpsc::UnboundedSender<KioskEvent>,
    restart: RestartScheduler,
    state: Mutex<SessionState>,
    session: Mutex<Option<ClaimSession>>,
    in_flight: AtomicBool,
    retry: Mutex<Option<RetryAction>>,
}

impl ClaimOrchestrator {
    /// Build the orchestrator and its event stream. Must run inside a tokio
    /// runtime — the restart countdown pump is spawned here.
    pub fn new(
        config: KioskConfig,
        backend: Arc<dyn ClaimBackend>,
        camera: Arc<dyn Camera>,
        rfid: Arc<dyn RfidBridge>,
        metrics: Arc<KioskMetrics>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<KioskEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (restart, countdown_rx) = RestartScheduler::new();

        let orchestrator = Arc::new(Self {
            config,
            backend,
            camera,
            rfid,
            metrics,
            events,
            restart,
            state: Mutex::new(SessionState::Idle),
            session: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            retry: Mutex::new(None),
        });

        tokio::spawn(countdown_pump(
            Arc::downgrade(&orchestrator),
            countdown_rx,
        ));

        (orchestrator, events_rx)
    }

    /// Arm scanning. Call once after construction.
    pub fn start(&self) {
        self.transition(SessionState::Scanning);
        tracing::info!("kiosk scanning-ready");
    }

    pub fn current_state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// The retained session, if any (empty outside an active flow).
    pub fn active_session(&self) -> Option<ClaimSession> {
        self.session.lock().unwrap().clone()
    }

    /// Entry point for decoded QR text.
    ///
    /// Guarded by the in-flight flag: a second call while a session is
    /// processing is a no-op. The call returns once the session reaches a
    /// terminal outcome and recovery is scheduled.
    pub async fn on_credential_scanned(&self, raw_text: &str) -> ScanDisposition {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("scan ignored: session already in flight");
            return ScanDisposition::Ignored;
        }

        // The transition table is the second half of the guard: only the
        // Scanning state may accept a detection.
        if !self.transition(SessionState::Detected) {
            self.in_flight.store(false, Ordering::SeqCst);
            return ScanDisposition::Ignored;
        }

        self.metrics.scans.inc();
        self.run_flow(raw_text).await;
        ScanDisposition::Accepted
    }

    /// Re-run the blocked action for the manual-retry failure codes
    /// (`NetworkOffline`, `FinalizeFailed`). No-op when nothing is pending.
    pub async fn retry_manual(&self) -> ScanDisposition {
        let action = self.retry.lock().unwrap().take();
        match action {
            Some(RetryAction::Probe { raw_text }) => {
                tracing::info!("manual retry: re-running credential flow");
                self.run_flow(&raw_text).await;
                ScanDisposition::Accepted
            }
            Some(RetryAction::Finalize) => {
                tracing::info!("manual retry: re-running finalize");
                let session = self.session.lock().unwrap().clone();
                match session {
                    Some(session) => {
                        match self.finalize(&session).await {
                            Ok(message) => self.succeed(message),
                            Err(code) => self.fail(code),
                        }
                        ScanDisposition::Accepted
                    }
                    None => ScanDisposition::Ignored,
                }
            }
            None => ScanDisposition::Ignored,
        }
    }

    // ── Stage pipeline ──────────────────────────────────────────────────

    async fn run_flow(&self, raw_text: &str) {
        match self.drive(raw_text).await {
            Ok(message) => self.succeed(message),
            Err(code) => self.fail(code),
        }
    }

    async fn drive(&self, raw_text: &str) -> Result<String, FailureCode> {
        let scan = ScanResult::from_raw(raw_text);
        let parsed = match scan.parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "malformed credential");
                return Err(FailureCode::InvalidCredential);
            }
        };
        tracing::info!(claim_id = %parsed.claim_id, method = %parsed.method, "credential detected");

        self.transition(SessionState::VerifyingCredential);
        let session = self.credential_stage(raw_text).await?;

        self.transition(SessionState::AwaitingIdentity);
        let outcome = self.verify_identity(&session).await?;
        tracing::info!(
            method = session.verification_method.as_str(),
            similarity = outcome.similarity,
            "identity verified"
        );

        self.finalize(&session).await
    }

    /// Connectivity probe → backend QR verify → session build → best-effort
    /// enrichment.
    async fn credential_stage(&self, raw_text: &str) -> Result<ClaimSession, FailureCode> {
        if !self.backend.probe().await {
            tracing::warn!("connectivity probe failed, skipping backend calls");
            self.set_retry(RetryAction::Probe {
                raw_text: raw_text.to_string(),
            });
            return Err(FailureCode::NetworkOffline);
        }

        let grant = match self.backend.verify_credential(raw_text).await {
            Ok(grant) => grant,
            Err(e) if e.is_offline() => {
                tracing::warn!(error = %e, "claim service unreachable");
                self.set_retry(RetryAction::Probe {
                    raw_text: raw_text.to_string(),
                });
                return Err(FailureCode::NetworkOffline);
            }
            Err(e) => {
                tracing::warn!(error = %e, "credential rejected by claim service");
                return Err(FailureCode::CredentialRejected);
            }
        };

        let Some(method) = VerificationMethod::parse(&grant.method) else {
            tracing::error!(method = %grant.method, "claim carries an unknown verification method");
            return Err(FailureCode::UnknownMethod);
        };

        let mut session = ClaimSession {
            claim_id: grant.claim_id,
            student_id: grant.student_id,
            verification_method: method,
            found_item_id: grant.found_item_id,
            locker_id: grant.locker_id,
            expires_at: grant.expires_at,
            face_embedding: grant.face_embedding,
            rfid_uid: grant.rfid_uid,
        };

        if session.has_expired(Timestamp::now()) {
            tracing::warn!(claim_id = %session.claim_id, "credential accepted but already lapsed");
            return Err(FailureCode::CredentialRejected);
        }

        match self.backend.fetch_claim(&session.claim_id).await {
            Ok(data) => session.merge_enrichment(data),
            Err(e) => {
                tracing::warn!(error = %e, "enrichment fetch failed, continuing with limited data");
                self.emit(KioskEvent::Notice(
                    "Some claim details are unavailable — continuing.".to_string(),
                ));
            }
        }

        *self.session.lock().unwrap() = Some(session.clone());
        self.metrics.session_active.set(1);
        Ok(session)
    }

    /// Dispatch to the verifier variant for the session's method; owns the
    /// face→RFID fallback decision.
    async fn verify_identity(
        &self,
        session: &ClaimSession,
    ) -> Result<VerificationOutcome, FailureCode> {
        let timer = self.metrics.identity_verify_seconds.start_timer();
        let result = self.verify_identity_inner(session).await;
        timer.observe_duration();
        result
    }

    async fn verify_identity_inner(
        &self,
        session: &ClaimSession,
    ) -> Result<VerificationOutcome, FailureCode> {
        match session.verification_method {
            VerificationMethod::Face => {
                let outcome = self.attempt_face(session).await;
                if outcome.is_match() {
                    return Ok(outcome);
                }

                // Face exhaustion (or a non-retryable face precondition)
                // falls back to RFID when the claim carries a card UID.
                if session.rfid_uid.is_some() {
                    tracing::info!("face attempt unmatched, falling back to RFID");
                    self.metrics.fallbacks.inc();
                    self.emit(KioskEvent::Notice(
                        "Face check unsuccessful — tap your campus card instead.".to_string(),
                    ));
                    let fallback = self.attempt_rfid(session).await;
                    if fallback.is_match() {
                        return Ok(fallback);
                    }
                    return Err(fallback.error.unwrap_or(FailureCode::IdentityFailed));
                }

                Err(outcome.error.unwrap_or(FailureCode::IdentityFailed))
            }
            VerificationMethod::Rfid => {
                let outcome = self.attempt_rfid(session).await;
                if outcome.is_match() {
                    Ok(outcome)
                } else {
                    Err(outcome.error.unwrap_or(FailureCode::IdentityFailed))
                }
            }
        }
    }

    async fn attempt_face(&self, session: &ClaimSession) -> VerificationOutcome {
        let (feedback_tx, mut feedback_rx) = mpsc::unbounded_channel();
        let events = self.events.clone();
        let forward = tokio::spawn(async move {
            while let Some(feedback) = feedback_rx.recv().await {
                let _ = events.send(KioskEvent::FaceFeedback(feedback));
            }
        });

        let verifier = FaceVerifier::new(
            Arc::clone(&self.camera),
            Arc::clone(&self.backend),
            self.config.face_threshold,
            self.config.face_attempts,
            Some(feedback_tx),
        );
        let outcome = self.race(&verifier, session).await;
        forward.abort();
        outcome
    }

    async fn attempt_rfid(&self, session: &ClaimSession) -> VerificationOutcome {
        let verifier = RfidVerifier::new(
            Arc::clone(&self.rfid),
            self.config.rfid_poll_timeout_secs,
        );
        self.race(&verifier, session).await
    }

    /// Run one verifier attempt under the hard timeout window. On expiry
    /// the verifier is cancelled (stopping its hardware) before the timeout
    /// is reported, so the device is free for the next owner.
    async fn race<V: IdentityVerifier>(
        &self,
        verifier: &V,
        session: &ClaimSession,
    ) -> VerificationOutcome {
        let window = Duration::from_secs(self.config.identity_timeout_secs);
        let raced = run_with_timeout(verifier.attempt(session), window, || async {
            verifier.cancel();
        })
        .await;

        match raced {
            Raced::Completed(outcome) => outcome,
            Raced::Expired => {
                tracing::warn!(verifier = verifier.name(), "identity attempt timed out");
                VerificationOutcome::failure(FailureCode::HardwareTimeout)
            }
        }
    }

    /// Locker release when the session names a locker, staff handoff
    /// otherwise. Failure retains the session so the same action can be
    /// retried without re-scanning.
    async fn finalize(&self, session: &ClaimSession) -> Result<String, FailureCode> {
        self.transition(SessionState::Unlocking);

        match &session.locker_id {
            Some(locker_id) => {
                let request = LockerOpenRequest {
                    locker_id: locker_id.clone(),
                    claim_id: session.claim_id.clone(),
                    student_id: session.student_id.clone(),
                    timestamp: Timestamp::now(),
                };
                match self.backend.open_locker(request).await {
                    Ok(()) => {
                        tracing::info!(locker = %locker_id, claim_id = %session.claim_id, "locker released");
                        Ok(format!("Locker {locker_id} is open — collect your item."))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, locker = %locker_id, "locker release failed");
                        self.set_retry(RetryAction::Finalize);
                        Err(FailureCode::FinalizeFailed)
                    }
                }
            }
            None => {
                match self
                    .backend
                    .finalize_claim(&session.claim_id, self.config.staff_window_secs)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(claim_id = %session.claim_id, "claim finalized for staff handoff");
                        Ok("Claim confirmed — collect your item at the service desk.".to_string())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "staff-handoff finalize failed");
                        self.set_retry(RetryAction::Finalize);
                        Err(FailureCode::FinalizeFailed)
                    }
                }
            }
        }
    }

    // ── Terminal handling ───────────────────────────────────────────────

    fn succeed(&self, message: String) {
        self.transition(SessionState::Success);
        self.metrics.successes.inc();
        self.emit(KioskEvent::StatusLine {
            severity: Severity::Success,
            text: message,
        });
        self.restart.schedule(RestartPlan {
            seconds: self.config.success_restart_delay_secs,
            immediate_switch: false,
        });
        self.transition(SessionState::AutoRestarting);
    }

    fn fail(&self, code: FailureCode) {
        tracing::warn!(code = code.as_str(), "session terminal failure");
        self.transition(SessionState::Failed);

        self.metrics.failures.inc();
        match code {
            FailureCode::NetworkOffline => self.metrics.network_errors.inc(),
            FailureCode::CameraUnavailable => self.metrics.permission_errors.inc(),
            _ => {}
        }

        self.emit(KioskEvent::StatusLine {
            severity: code.severity(),
            text: code.status_line().to_string(),
        });

        match code.recovery() {
            Recovery::AutoRestart { immediate_switch } => {
                self.restart.schedule(RestartPlan {
                    seconds: self.config.restart_delay_secs,
                    immediate_switch,
                });
                if immediate_switch {
                    // Keep scanning through the grace period; the countdown
                    // is display-only.
                    self.reset_to_scanning();
                } else {
                    self.transition(SessionState::AutoRestarting);
                }
            }
            Recovery::ManualRetry => {
                self.emit(KioskEvent::ManualRetryOffered { code });
            }
        }
    }

    /// Drop the session and re-arm scanning.
    fn reset_to_scanning(&self) {
        *self.session.lock().unwrap() = None;
        *self.retry.lock().unwrap() = None;
        self.metrics.session_active.set(0);
        self.transition(SessionState::Scanning);
        self.in_flight.store(false, Ordering::SeqCst);
        self.emit(KioskEvent::ScanningResumed);
    }

    fn transition(&self, next: SessionState) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !state.can_transition(next) {
                tracing::error!(
                    from = state.as_str(),
                    to = next.as_str(),
                    "invalid state transition refused"
                );
                return false;
            }
            *state = next;
        }
        self.emit(KioskEvent::StateChanged(next));
        true
    }

    fn set_retry(&self, action: RetryAction) {
        *self.retry.lock().unwrap() = Some(action);
    }

    fn emit(&self, event: KioskEvent) {
        let _ = self.events.send(event);
    }
}

/// Forwards countdown ticks to the event stream and performs the deferred
/// scanning reset when a countdown finishes.
async fn countdown_pump(
    orchestrator: Weak<ClaimOrchestrator>,
    mut countdown_rx: mpsc::UnboundedReceiver<CountdownEvent>,
) {
    while let Some(event) = countdown_rx.recv().await {
        let Some(orchestrator) = orchestrator.upgrade() else {
            break;
        };
        match event {
            CountdownEvent::Tick {
                remaining_secs,
                immediate_switch,
            } => {
                orchestrator.emit(KioskEvent::CountdownTick {
                    remaining_secs,
                    immediate_switch,
                });
            }
            CountdownEvent::Finished { immediate_switch } => {
                if !immediate_switch {
                    orchestrator.reset_to_scanning();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclaim_nullables::{NullBackend, NullCamera, NullRfidBridge};

    fn orchestrator_with(
        backend: NullBackend,
        camera: NullCamera,
        rfid: NullRfidBridge,
    ) -> (Arc<ClaimOrchestrator>, mpsc::UnboundedReceiver<KioskEvent>) {
        let (orchestrator, events) = ClaimOrchestrator::new(
            KioskConfig::default(),
            Arc::new(backend),
            Arc::new(camera),
            Arc::new(rfid),
            Arc::new(KioskMetrics::new()),
        );
        orchestrator.start();
        (orchestrator, events)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<KioskEvent>) -> Vec<KioskEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn malformed_credential_fails_with_deferred_restart() {
        let (orchestrator, mut events) = orchestrator_with(
            NullBackend::new(),
            NullCamera::no_face(),
            NullRfidBridge::with_taps(vec![]),
        );

        let disposition = orchestrator.on_credential_scanned("not a credential").await;
        assert_eq!(disposition, ScanDisposition::Accepted);
        assert_eq!(orchestrator.current_state(), SessionState::AutoRestarting);

        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(
            e,
            KioskEvent::StatusLine { severity: Severity::Warning, .. }
        )));
        assert!(events.contains(&KioskEvent::StateChanged(SessionState::Failed)));
    }

    #[tokio::test]
    async fn scan_while_processing_is_ignored() {
        let (orchestrator, _events) = orchestrator_with(
            NullBackend::new().with_grant(NullBackend::face_grant(vec![1.0, 0.0], None)),
            NullCamera::always_returning(vec![1.0, 0.0]),
            NullRfidBridge::with_taps(vec![]),
        );

        let first = orchestrator.on_credential_scanned("QRC|C0001|1234567|face");
        let second = orchestrator.on_credential_scanned("QRC|C0001|1234567|face");
        let (first, second) = tokio::join!(first, second);
        assert!(
            (first == ScanDisposition::Accepted) ^ (second == ScanDisposition::Accepted),
            "exactly one concurrent scan may win the guard"
        );
    }

    #[tokio::test]
    async fn scan_before_start_is_ignored() {
        let (orchestrator, _events) = ClaimOrchestrator::new(
            KioskConfig::default(),
            Arc::new(NullBackend::new()),
            Arc::new(NullCamera::no_face()),
            Arc::new(NullRfidBridge::with_taps(vec![])),
            Arc::new(KioskMetrics::new()),
        );
        // start() not called — still Idle.
        let disposition = orchestrator.on_credential_scanned("QRC|C1|t|face").await;
        assert_eq!(disposition, ScanDisposition::Ignored);
        assert_eq!(orchestrator.current_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn unknown_backend_method_is_terminal() {
        let mut grant = NullBackend::face_grant(vec![1.0], None);
        grant.method = "retina".into();
        let (orchestrator, mut events) = orchestrator_with(
            NullBackend::new().with_grant(grant),
            NullCamera::no_face(),
            NullRfidBridge::with_taps(vec![]),
        );

        orchestrator.on_credential_scanned("QRC|C0001|1234567|face").await;
        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(
            e,
            KioskEvent::StatusLine { text, .. } if text.contains("can't be verified")
        )));
    }

    #[tokio::test]
    async fn enrichment_failure_is_a_notice_not_a_failure() {
        let stored = vec![0.5f32, 0.5];
        let (orchestrator, mut events) = orchestrator_with(
            NullBackend::new()
                .with_grant(NullBackend::face_grant(stored.clone(), None))
                .with_enrichment_error(),
            NullCamera::always_returning(stored),
            NullRfidBridge::with_taps(vec![]),
        );

        orchestrator.on_credential_scanned("QRC|C0001|1234567|face").await;
        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(e, KioskEvent::Notice(_))));
        assert!(events.contains(&KioskEvent::StateChanged(SessionState::Success)));
    }

    #[tokio::test]
    async fn finalize_failure_retains_session_and_offers_retry() {
        let stored = vec![0.5f32, 0.5];
        let backend = NullBackend::new()
            .with_grant(NullBackend::face_grant(stored.clone(), None))
            .with_locker_error(reclaim_backend::BackendError::Other("jammed".into()));
        let (orchestrator, mut events) = orchestrator_with(
            backend.clone(),
            NullCamera::always_returning(stored),
            NullRfidBridge::with_taps(vec![]),
        );

        orchestrator.on_credential_scanned("QRC|C0001|1234567|face").await;
        assert_eq!(orchestrator.current_state(), SessionState::Failed);
        assert!(orchestrator.active_session().is_some(), "session retained");
        assert!(drain(&mut events).iter().any(|e| matches!(
            e,
            KioskEvent::ManualRetryOffered {
                code: FailureCode::FinalizeFailed
            }
        )));

        // Unjam the locker and retry the same finalize without re-scanning.
        backend.set_locker_ok();
        let disposition = orchestrator.retry_manual().await;
        assert_eq!(disposition, ScanDisposition::Accepted);
        assert_eq!(backend.verify_calls(), 1, "no re-verification on retry");
        assert_eq!(backend.locker_open_calls(), 2);
        assert!(drain(&mut events).contains(&KioskEvent::StateChanged(SessionState::Success)));
    }

    #[tokio::test]
    async fn retry_without_a_pending_action_is_ignored() {
        let (orchestrator, _events) = orchestrator_with(
            NullBackend::new(),
            NullCamera::no_face(),
            NullRfidBridge::with_taps(vec![]),
        );
        assert_eq!(orchestrator.retry_manual().await, ScanDisposition::Ignored);
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_restart_returns_to_scanning_when_the_countdown_ends() {
        let (orchestrator, _events) = orchestrator_with(
            NullBackend::new(),
            NullCamera::no_face(),
            NullRfidBridge::with_taps(vec![]),
        );

        orchestrator.on_credential_scanned("garbage").await;
        assert_eq!(orchestrator.current_state(), SessionState::AutoRestarting);

        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(orchestrator.current_state(), SessionState::Scanning);

        // And the kiosk accepts scans again.
        let disposition = orchestrator.on_credential_scanned("garbage").await;
        assert_eq!(disposition, ScanDisposition::Accepted);
    }
}
