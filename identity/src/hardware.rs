//! Hardware seams.
//!
//! The camera and the RFID reader are external peripherals driven through
//! these traits so the scheduler's timeout race and mode-switch cancellation
//! compose uniformly over real adapters and test doubles.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The OS or the claimant denied camera access.
    #[error("camera access denied")]
    PermissionDenied,

    #[error("face detection model failed to load: {0}")]
    ModelLoad(String),

    #[error("camera stream lost: {0}")]
    Disconnected(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RfidError {
    /// The push channel could not be established; callers fall back to the
    /// poll channel.
    #[error("RFID push channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("RFID hardware fault: {0}")]
    Hardware(String),
}

/// One event from the RFID push channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapEvent {
    /// A card was tapped.
    Card { uid: String },
    /// The reader reported a fault for this tap.
    Fault { message: String },
}

/// Live camera stream plus face detection, owned by the face verifier while
/// an attempt runs.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Open the stream and load the detection model.
    async fn start(&self) -> Result<(), CameraError>;

    /// Grab a frame and extract a face descriptor from it. `None` means no
    /// face was found in the frame — not an error, just a miss.
    async fn capture_descriptor(&self) -> Result<Option<Vec<f32>>, CameraError>;

    /// Grab a raw frame for the server-side comparison fallback.
    async fn capture_frame(&self) -> Result<Vec<u8>, CameraError>;

    /// Stop the stream. Idempotent; stopping a stopped camera is a no-op.
    fn stop(&self);
}

/// Card-tap source — push-style primary channel, poll-based secondary.
#[async_trait]
pub trait RfidBridge: Send + Sync {
    /// Establish the push channel. Tap events arrive on the receiver until
    /// the bridge is stopped or the channel is lost.
    async fn subscribe(&self) -> Result<mpsc::Receiver<TapEvent>, RfidError>;

    /// Poll-based fallback: wait up to `timeout_secs` for one tap.
    /// `None` means the window elapsed without a card.
    async fn poll(&self, timeout_secs: u64) -> Result<Option<String>, RfidError>;

    /// Tear down the push channel and stop listening. Idempotent.
    fn stop(&self);
}
