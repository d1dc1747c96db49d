//! The claim session — the unit of work for one claimant interaction.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity-proof mechanism attached to a claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    /// Facial similarity against the embedding registered with the claim.
    Face,
    /// RFID card match against the UID registered with the claim.
    Rfid,
}

impl VerificationMethod {
    /// Parse a method name as it appears in credentials and backend
    /// responses. Case-insensitive; `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face" => Some(Self::Face),
            "rfid" => Some(Self::Rfid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Rfid => "rfid",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One claimant interaction, created when the claim service accepts a QR
/// credential and dropped when the orchestrator resets to scanning.
///
/// Exactly one session is active at a time. Once identity verification
/// begins the session is immutable except for [`merge_enrichment`], which
/// only fills fields that are still empty.
///
/// [`merge_enrichment`]: ClaimSession::merge_enrichment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimSession {
    pub claim_id: String,
    pub student_id: String,
    pub verification_method: VerificationMethod,
    /// The found item this claim releases.
    pub found_item_id: String,
    /// Target locker; absent means the staff-handoff finalization path.
    pub locker_id: Option<String>,
    pub expires_at: Timestamp,
    /// Face descriptor registered with the claim (face method).
    pub face_embedding: Option<Vec<f32>>,
    /// Card UID registered with the claim (RFID method, or face fallback).
    pub rfid_uid: Option<String>,
}

/// Best-effort secondary data fetched from the document store.
///
/// Every field is optional — the fetch is allowed to fail entirely and the
/// claim stays actionable.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EnrichmentData {
    pub found_item_id: Option<String>,
    pub locker_id: Option<String>,
    pub expires_at: Option<Timestamp>,
    pub face_embedding: Option<Vec<f32>>,
    pub rfid_uid: Option<String>,
}

impl ClaimSession {
    /// Merge enrichment data into the session.
    ///
    /// Only fills fields that are still empty; `claim_id`, `student_id`, and
    /// `verification_method` are never touched.
    pub fn merge_enrichment(&mut self, data: EnrichmentData) {
        if self.found_item_id.is_empty() {
            if let Some(item) = data.found_item_id {
                self.found_item_id = item;
            }
        }
        if self.locker_id.is_none() {
            self.locker_id = data.locker_id;
        }
        if self.expires_at == Timestamp::EPOCH {
            if let Some(expires) = data.expires_at {
                self.expires_at = expires;
            }
        }
        if self.face_embedding.is_none() {
            self.face_embedding = data.face_embedding;
        }
        if self.rfid_uid.is_none() {
            self.rfid_uid = data.rfid_uid;
        }
    }

    /// Whether the credential behind this session has lapsed.
    ///
    /// An unset expiry (`EPOCH`) never counts as lapsed — the claim service
    /// already accepted the credential.
    pub fn has_expired(&self, now: Timestamp) -> bool {
        self.expires_at != Timestamp::EPOCH && self.expires_at.is_past(now)
    }
}
