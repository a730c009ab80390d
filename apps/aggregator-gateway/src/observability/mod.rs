//! Observability module for metrics and tracing.
//!
//! Prometheus metrics export and console logging with optional OTLP
//! span export.

/// Prometheus metric registration and recording helpers.
pub mod metrics;

/// tracing-subscriber setup with optional OpenTelemetry export.
pub mod tracing;

pub use metrics::{get_metrics_handle, init_metrics};
pub use tracing::{TracingConfig, TracingError, TracingGuard, config_from_env, init_tracing};
