//! OpenTelemetry tracing for the aggregator gateway.
//!
//! Console logging always runs through `tracing-subscriber` with an
//! `EnvFilter`. OTLP span export is optional and switches on when an
//! endpoint is configured, so local development needs no collector.

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directives when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVES: &str = "info,aggregator_gateway=debug";

/// Configuration for tracing and span export.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// OTLP endpoint URL; `None` disables span export.
    pub otlp_endpoint: Option<String>,
    /// Service name for resource attributes.
    pub service_name: String,
    /// Service version for resource attributes.
    pub service_version: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "aggregator-gateway".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TracingConfig {
    /// Create a configuration with span export to the given endpoint.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            otlp_endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Set the service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }
}

/// Create a tracing configuration from environment variables.
///
/// Reads:
/// - `OTEL_EXPORTER_OTLP_ENDPOINT` - enables OTLP export when set
/// - `OTEL_SERVICE_NAME` - service name override
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let service_name = std::env::var("OTEL_SERVICE_NAME")
        .unwrap_or_else(|_| "aggregator-gateway".to_string());

    TracingConfig {
        otlp_endpoint,
        service_name,
        ..Default::default()
    }
}

/// Error type for tracing initialization.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to create the OTLP exporter.
    #[error("failed to create OTLP exporter: {0}")]
    ExporterError(String),
}

/// Tracer provider handle for graceful shutdown.
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
}

impl TracingGuard {
    /// Shutdown the tracer provider, flushing any pending spans.
    ///
    /// Should be called before the process exits so exported spans are
    /// not lost.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider
            && let Err(e) = provider.shutdown()
        {
            tracing::error!(error = %e, "Failed to shutdown tracer provider");
        }
    }
}

/// Initialize the tracing subscriber, optionally with OTLP span export.
///
/// # Returns
///
/// A `TracingGuard` that should be held until shutdown.
///
/// # Errors
///
/// Returns an error if the OTLP exporter fails to initialize.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been set.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TracingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let Some(endpoint) = &config.otlp_endpoint else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return Ok(TracingGuard { provider: None });
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TracingError::ExporterError(e.to_string()))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", config.service_version.clone()),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer(config.service_name.clone());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(OpenTelemetryLayer::new(tracer))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        endpoint = %endpoint,
        service = %config.service_name,
        "OpenTelemetry span export initialized"
    );

    Ok(TracingGuard {
        provider: Some(provider),
    })
}
