//! Nullable infrastructure — deterministic stand-ins for the kiosk's
//! peripherals and the claim service.
//!
//! Each nullable records what was asked of it and answers from a script, so
//! orchestrator and verifier behavior can be tested without hardware or a
//! network. The daemon also wires these in under `--simulate` for bench
//! testing a kiosk image without peripherals attached.

pub mod backend;
pub mod camera;
pub mod rfid;

pub use backend::NullBackend;
pub use camera::NullCamera;
pub use rfid::NullRfidBridge;
