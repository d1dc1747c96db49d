//! Kiosk configuration with TOML file support.

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Configuration for the kiosk.
///
/// Can be loaded from a TOML file via [`KioskConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Base URL of the claim service.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Base URL of the local vision agent (camera + detection model).
    #[serde(default = "default_vision_agent_url")]
    pub vision_agent_url: String,

    /// WebSocket push endpoint of the RFID reader agent.
    #[serde(default = "default_rfid_ws_url")]
    pub rfid_ws_url: String,

    /// HTTP base of the RFID reader agent (poll fallback).
    #[serde(default = "default_rfid_agent_url")]
    pub rfid_agent_url: String,

    /// Face similarity acceptance threshold; lower is stricter.
    #[serde(default = "default_face_threshold")]
    pub face_threshold: f64,

    /// Capture attempts before a face attempt counts as exhausted.
    #[serde(default = "default_face_attempts")]
    pub face_attempts: u32,

    /// Hard ceiling on one identity attempt (either variant), in seconds.
    #[serde(default = "default_identity_timeout_secs")]
    pub identity_timeout_secs: u64,

    /// Poll window handed to the RFID fallback channel, in seconds.
    #[serde(default = "default_rfid_poll_timeout_secs")]
    pub rfid_poll_timeout_secs: u64,

    /// Auto-restart countdown after failures, in seconds.
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,

    /// Auto-restart countdown after a successful unlock, in seconds.
    #[serde(default = "default_success_restart_delay_secs")]
    pub success_restart_delay_secs: u64,

    /// Staff handling window reported on the no-locker finalize path, in
    /// seconds.
    #[serde(default = "default_staff_window_secs")]
    pub staff_window_secs: u64,

    /// Whether to run the status server (/healthz, /metrics).
    #[serde(default = "default_true")]
    pub enable_status: bool,

    /// Status server port.
    #[serde(default = "default_status_port")]
    pub status_port: u16,

    /// Run against simulated peripherals instead of the local agents.
    #[serde(default)]
    pub simulate: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_backend_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_vision_agent_url() -> String {
    "http://127.0.0.1:9090".to_string()
}

fn default_rfid_ws_url() -> String {
    "ws://127.0.0.1:9091/rfid/taps".to_string()
}

fn default_rfid_agent_url() -> String {
    "http://127.0.0.1:9091".to_string()
}

fn default_face_threshold() -> f64 {
    0.6
}

fn default_face_attempts() -> u32 {
    3
}

fn default_identity_timeout_secs() -> u64 {
    reclaim_identity::VERIFY_TIMEOUT_SECS
}

fn default_rfid_poll_timeout_secs() -> u64 {
    50
}

fn default_restart_delay_secs() -> u64 {
    4
}

fn default_success_restart_delay_secs() -> u64 {
    6
}

fn default_staff_window_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_status_port() -> u16 {
    7070
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl KioskConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SessionError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SessionError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SessionError> {
        toml::from_str(s).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("KioskConfig is always serializable to TOML")
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            vision_agent_url: default_vision_agent_url(),
            rfid_ws_url: default_rfid_ws_url(),
            rfid_agent_url: default_rfid_agent_url(),
            face_threshold: default_face_threshold(),
            face_attempts: default_face_attempts(),
            identity_timeout_secs: default_identity_timeout_secs(),
            rfid_poll_timeout_secs: default_rfid_poll_timeout_secs(),
            restart_delay_secs: default_restart_delay_secs(),
            success_restart_delay_secs: default_success_restart_delay_secs(),
            staff_window_secs: default_staff_window_secs(),
            enable_status: default_true(),
            status_port: default_status_port(),
            simulate: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
