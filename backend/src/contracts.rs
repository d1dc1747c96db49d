//! Collaborator contracts — request/response shape, not transport detail.

use crate::error::BackendError;
use async_trait::async_trait;
use reclaim_types::{EnrichmentData, Timestamp};

/// Everything the claim service hands back when it accepts a credential.
///
/// `method` stays a raw string here: an unrecognized method must surface as
/// its own terminal failure in the orchestrator, not as a parse error buried
/// in the transport layer.
#[derive(Clone, Debug)]
pub struct CredentialGrant {
    pub claim_id: String,
    pub student_id: String,
    pub method: String,
    pub found_item_id: String,
    pub locker_id: Option<String>,
    pub expires_at: Timestamp,
    pub face_embedding: Option<Vec<f32>>,
    pub rfid_uid: Option<String>,
}

/// Server-side face comparison request (dimension-mismatch fallback).
#[derive(Clone, Debug)]
pub struct ServerFaceRequest {
    pub claim_id: String,
    /// Captured camera frame, encoded by the transport.
    pub face_image: Vec<u8>,
    pub stored_embedding: Vec<f32>,
}

/// Server-side face comparison verdict. `score` is higher-is-better 0..1;
/// the similarity engine converts it to the uniform distance convention.
#[derive(Clone, Copy, Debug)]
pub struct ServerFaceVerdict {
    pub matched: bool,
    pub score: f64,
    pub threshold: f64,
}

#[derive(Clone, Debug)]
pub struct LockerOpenRequest {
    pub locker_id: String,
    pub claim_id: String,
    pub student_id: String,
    pub timestamp: Timestamp,
}

/// The orchestrator's only view of the outside services.
#[async_trait]
pub trait ClaimBackend: Send + Sync {
    /// Lightweight connectivity probe. Gates every other call — a kiosk that
    /// knows it is offline should not contend for hardware.
    async fn probe(&self) -> bool;

    /// Validate a scanned credential with the claim service.
    ///
    /// `Rejected` means the service answered and said no (used, expired, or
    /// forged credential); `Offline` means it could not be asked.
    async fn verify_credential(&self, credential_text: &str)
        -> Result<CredentialGrant, BackendError>;

    /// Best-effort secondary fetch from the document store. Failures are
    /// non-fatal to the claim flow.
    async fn fetch_claim(&self, claim_id: &str) -> Result<EnrichmentData, BackendError>;

    /// Server-side face comparison for embedding dimension mismatches.
    async fn face_verify(&self, request: ServerFaceRequest)
        -> Result<ServerFaceVerdict, BackendError>;

    /// Trigger physical locker release.
    async fn open_locker(&self, request: LockerOpenRequest) -> Result<(), BackendError>;

    /// Staff-handoff finalization for claims without a locker.
    async fn finalize_claim(&self, claim_id: &str, duration_secs: u64)
        -> Result<(), BackendError>;
}
