//! Claim session orchestrator.
//!
//! The only component holding session state: one orchestrator instance, one
//! active claim session at a time. A decoded QR credential comes in, the
//! orchestrator walks it through credential verification, identity
//! verification (face or RFID, with the face→RFID fallback), and locker
//! release or staff handoff — and after any terminal outcome hands control
//! to the restart scheduler so the kiosk returns to a scanning-ready state
//! on its own.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod shutdown;
pub mod status;

pub use config::KioskConfig;
pub use error::SessionError;
pub use events::KioskEvent;
pub use logging::{init_logging, LogFormat};
pub use metrics::KioskMetrics;
pub use orchestrator::{ClaimOrchestrator, ScanDisposition};
pub use shutdown::ShutdownController;
