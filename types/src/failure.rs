//! Failure taxonomy and recovery routing.
//!
//! Every stage-level failure is classified into exactly one [`FailureCode`]
//! at the orchestrator boundary. The code carries everything the kiosk needs
//! to react: a wire name, a claimant-readable status line, a severity, and
//! the recovery route back to a scanning-ready state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to claimant-facing status lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// How the kiosk gets back to scanning after a terminal failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// Countdown, then scan again. With `immediate_switch` the UI returns to
    /// scanning right away and the countdown runs in the background; without
    /// it the restart is deferred until the countdown reaches zero.
    AutoRestart { immediate_switch: bool },
    /// Offer a retry action instead of restarting — blind retries against a
    /// down network or an already-attempted finalize waste the claimant's
    /// time.
    ManualRetry,
}

/// Terminal failure classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    /// Scanned text is not a recognized credential layout.
    InvalidCredential,
    /// The claim service refused the credential.
    CredentialRejected,
    /// The connectivity precheck failed before any backend call.
    NetworkOffline,
    /// The claim names a verification method this kiosk does not implement.
    UnknownMethod,
    /// Camera access denied or camera gone.
    CameraUnavailable,
    /// Face detection model failed to load.
    ModelLoadFailure,
    /// The claim carries no face embedding to compare against.
    NoFaceData,
    /// Face and RFID options exhausted without a match.
    IdentityFailed,
    /// A card was tapped but its UID does not match the claim.
    CardMismatch,
    /// Hardware wait exceeded its window.
    HardwareTimeout,
    /// Locker release or staff-handoff finalize failed.
    FinalizeFailed,
}

impl FailureCode {
    /// Stable wire/metric name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::CredentialRejected => "CREDENTIAL_REJECTED",
            Self::NetworkOffline => "NETWORK_OFFLINE",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::CameraUnavailable => "CAMERA_UNAVAILABLE",
            Self::ModelLoadFailure => "MODEL_LOAD_FAILURE",
            Self::NoFaceData => "NO_FACE_DATA",
            Self::IdentityFailed => "IDENTITY_FAILED",
            Self::CardMismatch => "CARD_MISMATCH",
            Self::HardwareTimeout => "HARDWARE_TIMEOUT",
            Self::FinalizeFailed => "FINALIZE_FAILED",
        }
    }

    /// Claimant-readable status line for the terminal screen.
    pub fn status_line(self) -> &'static str {
        match self {
            Self::InvalidCredential => "That code isn't a pickup credential. Please scan the QR from your claim email.",
            Self::CredentialRejected => "This credential was not accepted. It may have been used already or expired.",
            Self::NetworkOffline => "The kiosk is offline. Please try again in a moment.",
            Self::UnknownMethod => "This claim can't be verified at this kiosk. Please see the service desk.",
            Self::CameraUnavailable => "The camera is unavailable. Please see the service desk.",
            Self::ModelLoadFailure => "Face check is out of service. Please see the service desk.",
            Self::NoFaceData => "No face data is registered for this claim.",
            Self::IdentityFailed => "We couldn't verify your identity. Please see the service desk.",
            Self::CardMismatch => "That card doesn't match this claim.",
            Self::HardwareTimeout => "Verification timed out. Please try again.",
            Self::FinalizeFailed => "The locker could not be released. Tap retry or see the service desk.",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::InvalidCredential | Self::NoFaceData | Self::CardMismatch | Self::HardwareTimeout => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Recovery route. Identity-stage failures switch the UI back to
    /// scanning immediately (the camera/hardware is already released and the
    /// next claimant shouldn't wait out the grace period); credential-stage
    /// failures and successes defer the restart until the countdown ends.
    pub fn recovery(self) -> Recovery {
        match self {
            Self::NetworkOffline | Self::FinalizeFailed => Recovery::ManualRetry,
            Self::CameraUnavailable
            | Self::ModelLoadFailure
            | Self::NoFaceData
            | Self::IdentityFailed
            | Self::CardMismatch
            | Self::HardwareTimeout => Recovery::AutoRestart {
                immediate_switch: true,
            },
            Self::InvalidCredential | Self::CredentialRejected | Self::UnknownMethod => {
                Recovery::AutoRestart {
                    immediate_switch: false,
                }
            }
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
