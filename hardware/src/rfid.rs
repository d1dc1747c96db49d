//! RFID bridge adapter over the local reader agent.
//!
//! Primary channel: a WebSocket the agent pushes tap frames on, each a JSON
//! object carrying `{"uid": …}` or `{"error": …}`. Secondary channel: HTTP
//! `GET /rfid/poll?timeout_sec=N`, used when the socket cannot be
//! established.

use async_trait::async_trait;
use futures_util::StreamExt;
use reclaim_identity::{RfidBridge, RfidError, TapEvent};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Extra slack on top of the poll window for the HTTP round trip.
const POLL_HTTP_MARGIN: Duration = Duration::from_secs(5);

/// Push-frame payload from the reader agent.
#[derive(Deserialize)]
struct TapFrame {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct PollResponseBody {
    success: bool,
    #[serde(default)]
    uid: Option<String>,
}

/// Card-tap source driven through the local reader agent.
pub struct AgentRfidBridge {
    http_client: reqwest::Client,
    ws_url: String,
    poll_url: String,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRfidBridge {
    /// `ws_url` is the push endpoint (`ws://…/rfid/taps`); `agent_url` the
    /// HTTP base for the poll fallback.
    pub fn new(ws_url: &str, agent_url: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            ws_url: ws_url.to_string(),
            poll_url: format!("{}/rfid/poll", agent_url.trim_end_matches('/')),
            reader: Mutex::new(None),
        }
    }

    fn parse_frame(text: &str) -> Option<TapEvent> {
        let frame: TapFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable tap frame");
                return None;
            }
        };
        match (frame.uid, frame.error) {
            (Some(uid), _) => Some(TapEvent::Card { uid }),
            (None, Some(message)) => Some(TapEvent::Fault { message }),
            (None, None) => None,
        }
    }
}

#[async_trait]
impl RfidBridge for AgentRfidBridge {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TapEvent>, RfidError> {
        let (ws_stream, _) = connect_async(&self.ws_url)
            .await
            .map_err(|e| RfidError::ChannelUnavailable(e.to_string()))?;
        tracing::debug!(url = %self.ws_url, "RFID push channel established");

        let (tx, rx) = mpsc::channel(16);
        let (_write, mut read) = ws_stream.split();

        let handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = Self::parse_frame(&text) {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            // Receiver side sees the channel close and degrades to polling.
        });

        *self.reader.lock().unwrap() = Some(handle);
        Ok(rx)
    }

    async fn poll(&self, timeout_secs: u64) -> Result<Option<String>, RfidError> {
        let request = self
            .http_client
            .get(&self.poll_url)
            .query(&[("timeout_sec", timeout_secs)])
            .timeout(Duration::from_secs(timeout_secs) + POLL_HTTP_MARGIN);

        let response = request
            .send()
            .await
            .map_err(|e| RfidError::Hardware(e.to_string()))?;
        let body: PollResponseBody = response
            .json()
            .await
            .map_err(|e| RfidError::Hardware(e.to_string()))?;

        if body.success {
            Ok(body.uid)
        } else {
            Ok(None)
        }
    }

    fn stop(&self) {
        if let Some(handle) = self.reader.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_frames_parse_as_card_taps() {
        assert_eq!(
            AgentRfidBridge::parse_frame(r#"{"uid":"04A3F1"}"#),
            Some(TapEvent::Card {
                uid: "04A3F1".into()
            })
        );
    }

    #[test]
    fn error_frames_parse_as_faults() {
        assert_eq!(
            AgentRfidBridge::parse_frame(r#"{"error":"antenna error"}"#),
            Some(TapEvent::Fault {
                message: "antenna error".into()
            })
        );
    }

    #[test]
    fn heartbeat_frames_are_ignored() {
        assert_eq!(AgentRfidBridge::parse_frame(r#"{}"#), None);
        assert_eq!(AgentRfidBridge::parse_frame("not json"), None);
    }

    #[test]
    fn stop_without_a_subscription_is_safe() {
        let bridge = AgentRfidBridge::new("ws://127.0.0.1:9091/rfid/taps", "http://127.0.0.1:9091");
        bridge.stop();
        bridge.stop();
    }
}
