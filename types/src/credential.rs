//! Decoded QR credential parsing.
//!
//! The QR scanner (an external collaborator) hands the kiosk already-decoded
//! text. A well-formed credential uses the structured layout
//! `QRC|<claim id>|<token>|<method>`, e.g. `QRC|C0001|1234567|face`.
//! Parsing is purely syntactic — whether the credential is genuine is the
//! claim service's call.

use crate::session::VerificationMethod;
use thiserror::Error;

/// Leading segment every credential must carry.
pub const CREDENTIAL_PREFIX: &str = "QRC";

/// Number of `|`-separated segments in a well-formed credential.
const SEGMENT_COUNT: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential does not start with the {CREDENTIAL_PREFIX} prefix")]
    MissingPrefix,

    #[error("credential has {0} segments, expected {SEGMENT_COUNT}")]
    WrongSegmentCount(usize),

    #[error("credential segment `{0}` is empty")]
    EmptyField(&'static str),

    #[error("unrecognized verification method `{0}`")]
    UnknownMethod(String),
}

/// The structured content of a well-formed credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCredential {
    pub claim_id: String,
    pub token: String,
    pub method: VerificationMethod,
}

/// Output of one QR detection event, normalized by the orchestrator.
///
/// Produced once per scan, consumed immediately, never persisted.
#[derive(Clone, Debug)]
pub struct ScanResult {
    /// The raw decoded text exactly as the scanner delivered it.
    pub raw: String,
    /// Parsed credential, or the reason the text was rejected.
    pub parsed: Result<ParsedCredential, CredentialError>,
}

impl ScanResult {
    pub fn from_raw(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            parsed: parse_credential(raw),
        }
    }
}

/// Parse decoded QR text into a [`ParsedCredential`].
///
/// Leading/trailing whitespace is tolerated (serial-mode scanners append a
/// newline); everything else must match the layout exactly.
pub fn parse_credential(raw: &str) -> Result<ParsedCredential, CredentialError> {
    let trimmed = raw.trim();
    let segments: Vec<&str> = trimmed.split('|').collect();

    if segments.len() != SEGMENT_COUNT {
        // A missing prefix with the right segment count reads better as a
        // prefix error, so only count segments first.
        return Err(CredentialError::WrongSegmentCount(segments.len()));
    }
    if segments[0] != CREDENTIAL_PREFIX {
        return Err(CredentialError::MissingPrefix);
    }
    if segments[1].is_empty() {
        return Err(CredentialError::EmptyField("claim id"));
    }
    if segments[2].is_empty() {
        return Err(CredentialError::EmptyField("token"));
    }

    let method = VerificationMethod::parse(segments[3])
        .ok_or_else(|| CredentialError::UnknownMethod(segments[3].to_string()))?;

    Ok(ParsedCredential {
        claim_id: segments[1].to_string(),
        token: segments[2].to_string(),
        method,
    })
}
