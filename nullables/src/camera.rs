//! Nullable camera — scripted descriptors instead of a video stream.

use async_trait::async_trait;
use reclaim_identity::{Camera, CameraError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StartBehavior {
    Ok,
    PermissionDenied,
    ModelFailure,
}

struct Inner {
    start: StartBehavior,
    /// Per-capture script; popped front to back.
    script: Mutex<VecDeque<Option<Vec<f32>>>>,
    /// Answer when the script is empty. `None` here means "no face found".
    fallback: Mutex<Option<Vec<f32>>>,
    frame: Vec<u8>,
    started: AtomicBool,
    captures: AtomicU32,
    stops: AtomicU32,
}

/// A camera that answers from a script.
#[derive(Clone)]
pub struct NullCamera {
    inner: Arc<Inner>,
}

impl NullCamera {
    fn build(start: StartBehavior, fallback: Option<Vec<f32>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                start,
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(fallback),
                frame: vec![0xFF, 0xD8, 0xFF], // looks enough like a JPEG
                started: AtomicBool::new(false),
                captures: AtomicU32::new(0),
                stops: AtomicU32::new(0),
            }),
        }
    }

    /// Every capture finds a face with this descriptor.
    pub fn always_returning(descriptor: Vec<f32>) -> Self {
        Self::build(StartBehavior::Ok, Some(descriptor))
    }

    /// Every capture finds no face.
    pub fn no_face() -> Self {
        Self::build(StartBehavior::Ok, None)
    }

    /// Camera access is denied at start.
    pub fn denied() -> Self {
        Self::build(StartBehavior::PermissionDenied, None)
    }

    /// The detection model fails to load at start.
    pub fn model_failure() -> Self {
        Self::build(StartBehavior::ModelFailure, None)
    }

    /// Queue captures that run before the fallback kicks in. `None` entries
    /// are no-face frames.
    pub fn with_script(self, captures: Vec<Option<Vec<f32>>>) -> Self {
        *self.inner.script.lock().unwrap() = captures.into();
        self
    }

    pub fn capture_count(&self) -> u32 {
        self.inner.captures.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.inner.stops.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for NullCamera {
    async fn start(&self) -> Result<(), CameraError> {
        match self.inner.start {
            StartBehavior::Ok => {
                self.inner.started.store(true, Ordering::SeqCst);
                Ok(())
            }
            StartBehavior::PermissionDenied => Err(CameraError::PermissionDenied),
            StartBehavior::ModelFailure => {
                Err(CameraError::ModelLoad("scripted model failure".into()))
            }
        }
    }

    async fn capture_descriptor(&self) -> Result<Option<Vec<f32>>, CameraError> {
        self.inner.captures.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.inner.script.lock().unwrap().pop_front() {
            return Ok(scripted);
        }
        Ok(self.inner.fallback.lock().unwrap().clone())
    }

    async fn capture_frame(&self) -> Result<Vec<u8>, CameraError> {
        Ok(self.inner.frame.clone())
    }

    fn stop(&self) {
        self.inner.started.store(false, Ordering::SeqCst);
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_runs_before_fallback() {
        let camera = NullCamera::always_returning(vec![1.0]).with_script(vec![None]);
        assert_eq!(camera.capture_descriptor().await.unwrap(), None);
        assert_eq!(camera.capture_descriptor().await.unwrap(), Some(vec![1.0]));
        assert_eq!(camera.capture_count(), 2);
    }

    #[tokio::test]
    async fn stop_is_countable_and_safe_when_never_started() {
        let camera = NullCamera::no_face();
        camera.stop();
        camera.stop();
        assert_eq!(camera.stop_count(), 2);
        assert!(!camera.is_started());
    }
}
