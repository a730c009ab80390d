//! Prometheus Metrics Module
//!
//! Exposes gateway metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Relay**: requests over the relay surface by method and outcome
//! - **Upstream**: aggregation API responses by status class, latency
//! - **Auth**: token refreshes by trigger, coalesced refreshes
//! - **Polling**: quote poll attempts
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the gateway HTTP port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Relay counters
    describe_counter!(
        "gateway_relay_requests_total",
        "Total requests over the relay surface by method and outcome"
    );

    // Upstream counters
    describe_counter!(
        "gateway_upstream_responses_total",
        "Total aggregation API responses by status class"
    );

    // Auth counters
    describe_counter!(
        "gateway_auth_refresh_total",
        "Total service-account token refreshes by trigger"
    );
    describe_counter!(
        "gateway_auth_refresh_coalesced_total",
        "Refresh attempts resolved by another task's concurrent refresh"
    );

    // Polling counters
    describe_counter!(
        "gateway_quote_poll_attempts_total",
        "Total quote poll fetch attempts"
    );

    // Latency histograms
    describe_histogram!(
        "gateway_upstream_latency_seconds",
        "Aggregation API round-trip time"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for relay request outcomes.
#[derive(Debug, Clone, Copy)]
pub enum RelayOutcome {
    /// Request reached the upstream and its reply was passed through.
    Relayed,
    /// Rejected before dialing: the configured base URL is unusable.
    ConfigRejected,
    /// Request method was not recognized.
    InvalidMethod,
    /// Network failure talking to the upstream.
    TransportFailed,
}

impl RelayOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Relayed => "relayed",
            Self::ConfigRejected => "config_rejected",
            Self::InvalidMethod => "invalid_method",
            Self::TransportFailed => "transport_failed",
        }
    }
}

/// Metric labels for token refresh triggers.
#[derive(Debug, Clone, Copy)]
pub enum RefreshTrigger {
    /// Refresh driven by an upstream 401.
    Unauthorized,
    /// Refresh requested over the auth surface.
    Manual,
}

impl RefreshTrigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Manual => "manual",
        }
    }
}

/// Record a request handled by the relay surface.
pub fn record_relay_request(method: &str, outcome: RelayOutcome) {
    counter!(
        "gateway_relay_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record an upstream response and its round-trip time.
pub fn record_upstream_response(status: u16, elapsed: Duration) {
    let class = status_class(status);
    counter!(
        "gateway_upstream_responses_total",
        "status_class" => class
    )
    .increment(1);
    histogram!(
        "gateway_upstream_latency_seconds",
        "status_class" => class
    )
    .record(elapsed.as_secs_f64());
}

/// Record a service-account token refresh.
pub fn record_auth_refresh(trigger: RefreshTrigger) {
    counter!(
        "gateway_auth_refresh_total",
        "trigger" => trigger.as_str()
    )
    .increment(1);
}

/// Record a refresh resolved by another task's concurrent refresh.
pub fn record_auth_refresh_coalesced() {
    counter!("gateway_auth_refresh_coalesced_total").increment(1);
}

/// Record one quote poll fetch attempt.
pub fn record_quote_poll_attempt() {
    counter!("gateway_quote_poll_attempts_total").increment(1);
}

const fn status_class(status: u16) -> &'static str {
    match status / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

// =============================================================================
// Tests
// =============================================================================
