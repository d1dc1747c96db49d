//! Fundamental types for the Reclaim kiosk.
//!
//! Everything the orchestrator, the identity verifiers, and the backend
//! client agree on lives here: the claim session, the decoded QR credential,
//! verification outcomes, the session state machine, the failure taxonomy,
//! and the timestamp type.

pub mod credential;
pub mod failure;
pub mod outcome;
pub mod session;
pub mod state;
pub mod time;

pub use credential::{parse_credential, CredentialError, ParsedCredential, ScanResult};
pub use failure::{FailureCode, Recovery, Severity};
pub use outcome::VerificationOutcome;
pub use session::{ClaimSession, EnrichmentData, VerificationMethod};
pub use state::SessionState;
pub use time::Timestamp;
