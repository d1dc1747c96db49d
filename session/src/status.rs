//! Status server — `/healthz` and `/metrics`.

use crate::metrics::KioskMetrics;
use crate::SessionError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Serve the status endpoints until the shutdown signal fires.
pub async fn serve(
    port: u16,
    metrics: Arc<KioskMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), SessionError> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_text))
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| SessionError::Status(format!("bind failed on port {port}: {e}")))?;
    tracing::info!(port, "status server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| SessionError::Status(e.to_string()))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_text(State(metrics): State<Arc<KioskMetrics>>) -> (StatusCode, String) {
    let families = metrics.registry.gather();
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            String::from_utf8(buffer).unwrap_or_default(),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {e}"),
        ),
    }
}
