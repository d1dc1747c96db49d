//! Production peripheral adapters.
//!
//! The kiosk's camera and RFID reader are driven by small local agent
//! processes (the vision agent owns the video device and the detection
//! model; the RFID agent owns the reader). These adapters speak to them —
//! HTTP for the camera, WebSocket push with HTTP poll fallback for card
//! taps — and expose the `identity` crate's hardware seams.

pub mod camera;
pub mod rfid;

pub use camera::AgentCamera;
pub use rfid::AgentRfidBridge;
