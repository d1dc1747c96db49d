//! Prometheus metrics for the kiosk.
//!
//! Process-wide counters incremented by the orchestrator on terminal
//! transitions, read-only to every other component, reset only on process
//! restart.  The [`KioskMetrics`] struct owns a dedicated [`Registry`] that
//! the status server's `/metrics` endpoint encodes into the Prometheus text
//! exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

/// Central collection of all kiosk-level Prometheus metrics.
pub struct KioskMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Total credential scans accepted by the in-flight guard.
    pub scans: IntCounter,
    /// Total sessions ending in a successful release.
    pub successes: IntCounter,
    /// Total sessions ending in a terminal failure.
    pub failures: IntCounter,
    /// Terminal failures caused by denied camera access.
    pub permission_errors: IntCounter,
    /// Terminal failures caused by an unreachable network.
    pub network_errors: IntCounter,
    /// Face attempts that fell back to the RFID variant.
    pub fallbacks: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// 1 while a claim session is in flight.
    pub session_active: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of the identity-verification stage, in seconds.
    pub identity_verify_seconds: Histogram,
}

impl KioskMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let scans = register_int_counter_with_registry!(
            Opts::new("reclaim_scans_total", "Credential scans accepted"),
            registry
        )
        .expect("failed to register scans counter");

        let successes = register_int_counter_with_registry!(
            Opts::new(
                "reclaim_successes_total",
                "Sessions ending in a successful release"
            ),
            registry
        )
        .expect("failed to register successes counter");

        let failures = register_int_counter_with_registry!(
            Opts::new(
                "reclaim_failures_total",
                "Sessions ending in a terminal failure"
            ),
            registry
        )
        .expect("failed to register failures counter");

        let permission_errors = register_int_counter_with_registry!(
            Opts::new(
                "reclaim_permission_errors_total",
                "Terminal failures from denied camera access"
            ),
            registry
        )
        .expect("failed to register permission_errors counter");

        let network_errors = register_int_counter_with_registry!(
            Opts::new(
                "reclaim_network_errors_total",
                "Terminal failures from an unreachable network"
            ),
            registry
        )
        .expect("failed to register network_errors counter");

        let fallbacks = register_int_counter_with_registry!(
            Opts::new(
                "reclaim_fallbacks_total",
                "Face attempts that fell back to RFID"
            ),
            registry
        )
        .expect("failed to register fallbacks counter");

        let session_active = register_int_gauge_with_registry!(
            Opts::new("reclaim_session_active", "1 while a claim session is in flight"),
            registry
        )
        .expect("failed to register session_active gauge");

        let identity_verify_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "reclaim_identity_verify_seconds",
                "Wall time of the identity-verification stage"
            )
            .buckets(prometheus::exponential_buckets(0.5, 2.0, 8).unwrap()),
            registry
        )
        .expect("failed to register identity_verify_seconds histogram");

        Self {
            registry,
            scans,
            successes,
            failures,
            permission_errors,
            network_errors,
            fallbacks,
            session_active,
            identity_verify_seconds,
        }
    }
}

impl Default for KioskMetrics {
    fn default() -> Self {
        Self::new()
    }
}
