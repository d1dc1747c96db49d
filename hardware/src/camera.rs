//! Camera adapter over the local vision agent.
//!
//! The agent owns the video device and the face-detection model; the kiosk
//! drives it over loopback HTTP: `POST /camera/start`, `GET
//! /camera/descriptor`, `GET /camera/frame`, `POST /camera/stop`.

use async_trait::async_trait;
use base64::Engine as _;
use reclaim_identity::{Camera, CameraError};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Per-request timeout against the loopback agent.
const AGENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Camera driven through the local vision agent.
pub struct AgentCamera {
    http_client: reqwest::Client,
    base_url: String,
    started: AtomicBool,
}

#[derive(Deserialize)]
struct StartResponseBody {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct DescriptorResponseBody {
    found: bool,
    #[serde(default)]
    descriptor: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct FrameResponseBody {
    frame: String,
}

impl AgentCamera {
    pub fn new(base_url: &str) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(AGENT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            started: AtomicBool::new(false),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(e: reqwest::Error) -> CameraError {
        CameraError::Disconnected(e.to_string())
    }
}

#[async_trait]
impl Camera for AgentCamera {
    async fn start(&self) -> Result<(), CameraError> {
        let response = self
            .http_client
            .post(self.url("/camera/start"))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().as_u16() == 403 {
            return Err(CameraError::PermissionDenied);
        }

        let body: StartResponseBody = response
            .json()
            .await
            .map_err(|e| CameraError::Other(e.to_string()))?;
        if body.ok {
            self.started.store(true, Ordering::SeqCst);
            return Ok(());
        }

        // The agent names its failure; map the two we must distinguish.
        match body.error.as_deref() {
            Some("permission_denied") => Err(CameraError::PermissionDenied),
            Some("model_load") => Err(CameraError::ModelLoad("vision agent model load".into())),
            Some(other) => Err(CameraError::Other(other.to_string())),
            None => Err(CameraError::Other("vision agent refused start".into())),
        }
    }

    async fn capture_descriptor(&self) -> Result<Option<Vec<f32>>, CameraError> {
        let response = self
            .http_client
            .get(self.url("/camera/descriptor"))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body: DescriptorResponseBody = response
            .json()
            .await
            .map_err(|e| CameraError::Other(e.to_string()))?;
        if body.found {
            match body.descriptor {
                Some(descriptor) => Ok(Some(descriptor)),
                None => Err(CameraError::Other(
                    "agent reported a face but sent no descriptor".into(),
                )),
            }
        } else {
            Ok(None)
        }
    }

    async fn capture_frame(&self) -> Result<Vec<u8>, CameraError> {
        let response = self
            .http_client
            .get(self.url("/camera/frame"))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body: FrameResponseBody = response
            .json()
            .await
            .map_err(|e| CameraError::Other(e.to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(body.frame)
            .map_err(|e| CameraError::Other(format!("frame decode: {e}")))
    }

    fn stop(&self) {
        // Fire-and-forget; a second stop on an already-stopped camera is a
        // no-op by the swap.
        if self.started.swap(false, Ordering::SeqCst) {
            let request = self.http_client.post(self.url("/camera/stop"));
            tokio::spawn(async move {
                if let Err(e) = request.send().await {
                    tracing::debug!(error = %e, "camera stop request failed");
                }
            });
        }
    }
}
