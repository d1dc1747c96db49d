//! HTTP implementation of the claim-service contracts.

use crate::contracts::{
    ClaimBackend, CredentialGrant, LockerOpenRequest, ServerFaceRequest, ServerFaceVerdict,
};
use crate::error::BackendError;
use async_trait::async_trait;
use base64::Engine as _;
use reclaim_types::{EnrichmentData, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for claim-service requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the health probe — it must answer fast or not at all.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Claim-service client over HTTP (reusable connection pool).
pub struct HttpClaimBackend {
    http_client: reqwest::Client,
    base_url: String,
}

// ── Wire DTOs ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct VerifyRequestBody<'a> {
    credential_text: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponseBody {
    valid: bool,
    #[serde(default)]
    claim_id: Option<String>,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    verification_method: Option<String>,
    #[serde(default)]
    found_item_id: Option<String>,
    #[serde(default)]
    locker_id: Option<String>,
    #[serde(default)]
    expires_at: Option<u64>,
    #[serde(default)]
    face_embedding: Option<Vec<f32>>,
    #[serde(default)]
    rfid_uid: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ClaimResponseBody {
    success: bool,
    #[serde(default)]
    data: Option<EnrichmentData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct FaceVerifyRequestBody<'a> {
    face_image: String,
    stored_embedding: &'a [f32],
    claim_id: &'a str,
}

#[derive(Deserialize)]
struct FaceVerifyResponseBody {
    success: bool,
    #[serde(rename = "match", default)]
    matched: bool,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    threshold: f64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct LockerOpenRequestBody<'a> {
    locker_id: &'a str,
    claim_id: &'a str,
    student_id: &'a str,
    timestamp: u64,
}

#[derive(Serialize)]
struct FinalizeRequestBody {
    duration_sec: u64,
}

#[derive(Deserialize)]
struct AckResponseBody {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponseBody {
    ok: bool,
}

impl HttpClaimBackend {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify(e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Offline(format!("request timed out: {e}"))
        } else if e.is_connect() {
            BackendError::Offline(format!("connection failed: {e}"))
        } else {
            BackendError::Other(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(BackendError::Http {
                status: status.as_u16(),
                detail,
            })
        }
    }
}

#[async_trait]
impl ClaimBackend for HttpClaimBackend {
    async fn probe(&self) -> bool {
        let request = self
            .http_client
            .get(self.url("/api/health"))
            .timeout(PROBE_TIMEOUT);
        match request.send().await {
            Ok(response) if response.status().is_success() => response
                .json::<HealthResponseBody>()
                .await
                .map(|body| body.ok)
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn verify_credential(
        &self,
        credential_text: &str,
    ) -> Result<CredentialGrant, BackendError> {
        let response = self
            .http_client
            .post(self.url("/api/claims/qr-verify"))
            .json(&VerifyRequestBody { credential_text })
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check_status(response).await?;

        let body: VerifyResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if !body.valid {
            return Err(BackendError::Rejected(
                body.error.unwrap_or_else(|| "credential refused".into()),
            ));
        }

        let missing = |field: &str| {
            BackendError::InvalidResponse(format!("verify response missing `{field}`"))
        };
        Ok(CredentialGrant {
            claim_id: body.claim_id.ok_or_else(|| missing("claim_id"))?,
            student_id: body.student_id.ok_or_else(|| missing("student_id"))?,
            method: body
                .verification_method
                .ok_or_else(|| missing("verification_method"))?,
            found_item_id: body.found_item_id.unwrap_or_default(),
            locker_id: body.locker_id,
            expires_at: body.expires_at.map(Timestamp::new).unwrap_or(Timestamp::EPOCH),
            face_embedding: body.face_embedding,
            rfid_uid: body.rfid_uid,
        })
    }

    async fn fetch_claim(&self, claim_id: &str) -> Result<EnrichmentData, BackendError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/claims/{claim_id}")))
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check_status(response).await?;

        let body: ClaimResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(BackendError::Rejected(
                body.error.unwrap_or_else(|| "claim fetch refused".into()),
            ));
        }
        body.data
            .ok_or_else(|| BackendError::InvalidResponse("claim fetch returned no data".into()))
    }

    async fn face_verify(
        &self,
        request: ServerFaceRequest,
    ) -> Result<ServerFaceVerdict, BackendError> {
        let face_image = base64::engine::general_purpose::STANDARD.encode(&request.face_image);
        let response = self
            .http_client
            .post(self.url(&format!("/api/claims/{}/face-verify", request.claim_id)))
            .json(&FaceVerifyRequestBody {
                face_image,
                stored_embedding: &request.stored_embedding,
                claim_id: &request.claim_id,
            })
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check_status(response).await?;

        let body: FaceVerifyResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(BackendError::Rejected(
                body.error
                    .unwrap_or_else(|| "server face comparison refused".into()),
            ));
        }
        Ok(ServerFaceVerdict {
            matched: body.matched,
            score: body.score,
            threshold: body.threshold,
        })
    }

    async fn open_locker(&self, request: LockerOpenRequest) -> Result<(), BackendError> {
        let response = self
            .http_client
            .post(self.url("/api/lockers/open"))
            .json(&LockerOpenRequestBody {
                locker_id: &request.locker_id,
                claim_id: &request.claim_id,
                student_id: &request.student_id,
                timestamp: request.timestamp.as_secs(),
            })
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check_status(response).await?;

        let body: AckResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        if body.success {
            Ok(())
        } else {
            Err(BackendError::Rejected(
                body.error.unwrap_or_else(|| "locker open refused".into()),
            ))
        }
    }

    async fn finalize_claim(
        &self,
        claim_id: &str,
        duration_secs: u64,
    ) -> Result<(), BackendError> {
        let response = self
            .http_client
            .post(self.url(&format!("/api/claims/{claim_id}/finalize")))
            .json(&FinalizeRequestBody {
                duration_sec: duration_secs,
            })
            .send()
            .await
            .map_err(Self::classify)?;
        let response = Self::check_status(response).await?;

        let body: AckResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        if body.success {
            Ok(())
        } else {
            Err(BackendError::Rejected(
                body.error.unwrap_or_else(|| "finalize refused".into()),
            ))
        }
    }
}
