//! Nullable claim backend — scripted verdicts instead of HTTP.

use async_trait::async_trait;
use reclaim_backend::{
    BackendError, ClaimBackend, CredentialGrant, LockerOpenRequest, ServerFaceRequest,
    ServerFaceVerdict,
};
use reclaim_types::{EnrichmentData, Timestamp};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

struct Inner {
    probe_ok: AtomicBool,
    verify: Mutex<Result<CredentialGrant, BackendError>>,
    enrichment: Mutex<Result<EnrichmentData, BackendError>>,
    face: Mutex<Result<ServerFaceVerdict, BackendError>>,
    locker: Mutex<Result<(), BackendError>>,
    finalize: Mutex<Result<(), BackendError>>,
    probe_calls: AtomicU32,
    verify_calls: AtomicU32,
    fetch_calls: AtomicU32,
    face_verify_calls: AtomicU32,
    locker_open_calls: AtomicU32,
    finalize_calls: AtomicU32,
}

/// A claim backend that answers from a script and records every call.
#[derive(Clone)]
pub struct NullBackend {
    inner: Arc<Inner>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                probe_ok: AtomicBool::new(true),
                verify: Mutex::new(Err(BackendError::Rejected("unscripted".into()))),
                enrichment: Mutex::new(Ok(EnrichmentData::default())),
                face: Mutex::new(Ok(ServerFaceVerdict {
                    matched: false,
                    score: 0.0,
                    threshold: 0.0,
                })),
                locker: Mutex::new(Ok(())),
                finalize: Mutex::new(Ok(())),
                probe_calls: AtomicU32::new(0),
                verify_calls: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
                face_verify_calls: AtomicU32::new(0),
                locker_open_calls: AtomicU32::new(0),
                finalize_calls: AtomicU32::new(0),
            }),
        }
    }

    /// Convenience grant for a face-method claim with a locker.
    pub fn face_grant(embedding: Vec<f32>, rfid_uid: Option<&str>) -> CredentialGrant {
        CredentialGrant {
            claim_id: "C0001".into(),
            student_id: "1234567".into(),
            method: "face".into(),
            found_item_id: "ITEM-1".into(),
            locker_id: Some("L-04".into()),
            expires_at: Timestamp::EPOCH,
            face_embedding: Some(embedding),
            rfid_uid: rfid_uid.map(str::to_string),
        }
    }

    /// Convenience grant for an RFID-method claim with a locker.
    pub fn rfid_grant(uid: &str) -> CredentialGrant {
        CredentialGrant {
            claim_id: "C0002".into(),
            student_id: "7654321".into(),
            method: "rfid".into(),
            found_item_id: "ITEM-2".into(),
            locker_id: Some("L-07".into()),
            expires_at: Timestamp::EPOCH,
            face_embedding: None,
            rfid_uid: Some(uid.into()),
        }
    }

    // ── Script setters ──────────────────────────────────────────────────

    pub fn with_probe(self, ok: bool) -> Self {
        self.inner.probe_ok.store(ok, Ordering::SeqCst);
        self
    }

    pub fn with_grant(self, grant: CredentialGrant) -> Self {
        *self.inner.verify.lock().unwrap() = Ok(grant);
        self
    }

    pub fn with_verify_error(self, error: BackendError) -> Self {
        *self.inner.verify.lock().unwrap() = Err(error);
        self
    }

    pub fn with_enrichment(self, data: EnrichmentData) -> Self {
        *self.inner.enrichment.lock().unwrap() = Ok(data);
        self
    }

    pub fn with_enrichment_error(self) -> Self {
        *self.inner.enrichment.lock().unwrap() =
            Err(BackendError::Other("document store unreachable".into()));
        self
    }

    pub fn with_face_verdict(self, matched: bool, score: f64, threshold: f64) -> Self {
        *self.inner.face.lock().unwrap() = Ok(ServerFaceVerdict {
            matched,
            score,
            threshold,
        });
        self
    }

    pub fn with_locker_error(self, error: BackendError) -> Self {
        *self.inner.locker.lock().unwrap() = Err(error);
        self
    }

    pub fn with_finalize_error(self, error: BackendError) -> Self {
        *self.inner.finalize.lock().unwrap() = Err(error);
        self
    }

    /// Flip the probe mid-test (offline → back online for manual retry).
    pub fn set_probe(&self, ok: bool) {
        self.inner.probe_ok.store(ok, Ordering::SeqCst);
    }

    /// Clear a scripted locker failure (finalize retry path).
    pub fn set_locker_ok(&self) {
        *self.inner.locker.lock().unwrap() = Ok(());
    }

    // ── Call recording ──────────────────────────────────────────────────

    pub fn probe_calls(&self) -> u32 {
        self.inner.probe_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> u32 {
        self.inner.verify_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.inner.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn face_verify_calls(&self) -> u32 {
        self.inner.face_verify_calls.load(Ordering::SeqCst)
    }

    pub fn locker_open_calls(&self) -> u32 {
        self.inner.locker_open_calls.load(Ordering::SeqCst)
    }

    pub fn finalize_calls(&self) -> u32 {
        self.inner.finalize_calls.load(Ordering::SeqCst)
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimBackend for NullBackend {
    async fn probe(&self) -> bool {
        self.inner.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.probe_ok.load(Ordering::SeqCst)
    }

    async fn verify_credential(
        &self,
        _credential_text: &str,
    ) -> Result<CredentialGrant, BackendError> {
        self.inner.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify.lock().unwrap().clone()
    }

    async fn fetch_claim(&self, _claim_id: &str) -> Result<EnrichmentData, BackendError> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.enrichment.lock().unwrap().clone()
    }

    async fn face_verify(
        &self,
        _request: ServerFaceRequest,
    ) -> Result<ServerFaceVerdict, BackendError> {
        self.inner.face_verify_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.face.lock().unwrap().clone()
    }

    async fn open_locker(&self, _request: LockerOpenRequest) -> Result<(), BackendError> {
        self.inner.locker_open_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.locker.lock().unwrap().clone()
    }

    async fn finalize_claim(
        &self,
        _claim_id: &str,
        _duration_secs: u64,
    ) -> Result<(), BackendError> {
        self.inner.finalize_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.finalize.lock().unwrap().clone()
    }
}
