//! Reclaim kiosk daemon — entry point for running the kiosk.
//!
//! The QR scanner is a USB device in serial mode: it emits decoded
//! credential text as lines, which arrive here on stdin. Staff can also
//! type `retry` to fire the manual-retry action an offline or failed
//! finalize leaves behind.

use clap::Parser;
use reclaim_backend::HttpClaimBackend;
use reclaim_hardware::{AgentCamera, AgentRfidBridge};
use reclaim_identity::{Camera, FaceFeedback, RfidBridge};
use reclaim_nullables::{NullBackend, NullCamera, NullRfidBridge};
use reclaim_session::{
    init_logging, status, ClaimOrchestrator, KioskConfig, KioskEvent, KioskMetrics, LogFormat,
    ShutdownController,
};
use reclaim_types::Severity;
use reclaim_utils::format_countdown;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Face embedding used by the simulated peripherals; the simulated camera
/// always "sees" the registered claimant.
const SIMULATED_EMBEDDING: [f32; 3] = [0.21, 0.54, 0.8];

#[derive(Parser)]
#[command(name = "reclaim-kiosk", about = "Reclaim lost-and-found kiosk daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the claim service.
    #[arg(long, env = "RECLAIM_BACKEND_URL")]
    backend_url: Option<String>,

    /// Status server port (/healthz, /metrics).
    #[arg(long, env = "RECLAIM_STATUS_PORT")]
    status_port: Option<u16>,

    /// Run against simulated peripherals (no camera, reader, or backend).
    #[arg(long, env = "RECLAIM_SIMULATE")]
    simulate: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "RECLAIM_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, env = "RECLAIM_LOG_FORMAT")]
    log_format: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the kiosk.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config: Option<KioskConfig> = if let Some(ref config_path) = cli.config {
        match KioskConfig::from_toml_file(&config_path.display().to_string()) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!("failed to load config {}: {e}, using defaults", config_path.display());
                None
            }
        }
    } else {
        None
    };

    let mut config = file_config.unwrap_or_default();
    if let Some(backend_url) = cli.backend_url {
        config.backend_url = backend_url;
    }
    if let Some(status_port) = cli.status_port {
        config.status_port = status_port;
    }
    if cli.simulate {
        config.simulate = true;
    }
    if let Some(log_format) = cli.log_format {
        config.log_format = log_format;
    }
    config.log_level = cli.log_level;

    init_logging(LogFormat::parse(&config.log_format), &config.log_level);

    match cli.command {
        Command::Run => run(config).await,
    }
}

async fn run(config: KioskConfig) -> anyhow::Result<()> {
    tracing::info!(
        backend = %config.backend_url,
        simulate = config.simulate,
        "starting Reclaim kiosk"
    );

    let metrics = Arc::new(KioskMetrics::new());
    let shutdown = Arc::new(ShutdownController::new());

    let (orchestrator, events) = if config.simulate {
        let embedding = SIMULATED_EMBEDDING.to_vec();
        let backend = NullBackend::new()
            .with_grant(NullBackend::face_grant(embedding.clone(), Some("AB-12")));
        let camera: Arc<dyn Camera> = Arc::new(NullCamera::always_returning(embedding));
        let rfid: Arc<dyn RfidBridge> = Arc::new(NullRfidBridge::with_taps(vec![]));
        tracing::warn!("simulated peripherals active — every face scan will match");
        ClaimOrchestrator::new(
            config.clone(),
            Arc::new(backend),
            camera,
            rfid,
            Arc::clone(&metrics),
        )
    } else {
        let backend = HttpClaimBackend::new(&config.backend_url);
        let camera: Arc<dyn Camera> = Arc::new(AgentCamera::new(&config.vision_agent_url));
        let rfid: Arc<dyn RfidBridge> = Arc::new(AgentRfidBridge::new(
            &config.rfid_ws_url,
            &config.rfid_agent_url,
        ));
        ClaimOrchestrator::new(
            config.clone(),
            Arc::new(backend),
            camera,
            rfid,
            Arc::clone(&metrics),
        )
    };

    if config.enable_status {
        let status_metrics = Arc::clone(&metrics);
        let status_shutdown = shutdown.subscribe();
        let port = config.status_port;
        tokio::spawn(async move {
            if let Err(e) = status::serve(port, status_metrics, status_shutdown).await {
                tracing::error!(error = %e, "status server exited");
            }
        });
    }

    tokio::spawn(render_events(events));

    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        signal_shutdown.wait_for_signal().await;
    });

    orchestrator.start();
    scan_feed(&orchestrator, &shutdown).await;

    tracing::info!("Reclaim kiosk exited cleanly");
    Ok(())
}

/// Read decoded credential lines from stdin until shutdown.
async fn scan_feed(orchestrator: &Arc<ClaimOrchestrator>, shutdown: &ShutdownController) {
    let mut shutdown_rx = shutdown.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line.eq_ignore_ascii_case("retry") {
                        orchestrator.retry_manual().await;
                    } else {
                        orchestrator.on_credential_scanned(line).await;
                    }
                }
                Ok(None) => {
                    // Scanner feed closed; wait for the shutdown signal.
                    let _ = shutdown_rx.recv().await;
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "scan feed read failed");
                    break;
                }
            },
        }
    }
}

/// Render orchestrator events to the log. The kiosk's real display is an
/// external presentation process consuming the same stream.
async fn render_events(mut events: mpsc::UnboundedReceiver<KioskEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            KioskEvent::StateChanged(state) => {
                tracing::debug!(state = state.as_str(), "session state");
            }
            KioskEvent::StatusLine { severity, text } => match severity {
                Severity::Error => tracing::error!("{text}"),
                Severity::Warning => tracing::warn!("{text}"),
                _ => tracing::info!("{text}"),
            },
            KioskEvent::Notice(text) => tracing::info!("{text}"),
            KioskEvent::FaceFeedback(FaceFeedback::NoFaceFound { attempt }) => {
                tracing::info!(attempt, "no face in view — please step closer");
            }
            KioskEvent::FaceFeedback(FaceFeedback::Mismatch { attempt, distance }) => {
                tracing::info!(attempt, distance, "face not recognized yet");
            }
            KioskEvent::CountdownTick { remaining_secs, .. } => {
                tracing::info!("scanning resumes in {}", format_countdown(remaining_secs));
            }
            KioskEvent::ManualRetryOffered { code } => {
                tracing::warn!(code = code.as_str(), "manual retry available — type `retry`");
            }
            KioskEvent::ScanningResumed => {
                tracing::info!("ready — scan a claim QR code");
            }
        }
    }
}
