//! Aggregator Gateway Binary
//!
//! Starts the Polisure aggregator gateway.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin aggregator-gateway
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `AGGREGATOR_BASE_URL`: Base URL of the aggregation API
//! - `AGGREGATOR_SERVICE_USER_ID`: Service-account user id
//! - `AGGREGATOR_SERVICE_PASSWORD`: Service-account password
//! - `AGGREGATOR_SALES_CHANNEL_ID`: Sales channel identifier
//!
//! ## Optional
//! - `AGGREGATOR_ORIGIN`: Origin header value (default: <https://www.polisure.in>)
//! - `GATEWAY_BIND_ADDR`: Bind address (default: 0.0.0.0)
//! - `GATEWAY_HTTP_PORT`: HTTP server port (default: 8686)
//! - `UPSTREAM_TIMEOUT_SECS`: Upstream request timeout (default: 30)
//! - `UNAUTHORIZED_RETRY_LIMIT`: 401 refresh/replay bound (default: 3)
//! - `POLL_MAX_ATTEMPTS`: Quote poll attempt bound (default: 20)
//! - `POLL_INTERVAL_MS`: Quote poll interval in milliseconds (default: 3000)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (span export off when unset)
//! - `OTEL_SERVICE_NAME`: Service name (default: aggregator-gateway)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::time::Duration;

use aggregator_gateway::config::GatewayConfig;
use aggregator_gateway::infrastructure::aggregator::{AggregatorHttpClient, TokenStore};
use aggregator_gateway::observability::{config_from_env, init_metrics, init_tracing};
use aggregator_gateway::server::{GatewayServer, create_router};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize tracing (fmt output plus optional OTLP span export)
    let tracing_guard = init_tracing(&config_from_env())?;

    tracing::info!("Starting Polisure Aggregator Gateway");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration invalid, refusing to start");
            std::process::exit(1);
        }
    };
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let tokens = TokenStore::new();
    let client = AggregatorHttpClient::new(config.aggregator.clone(), tokens)?;
    let app = create_router(GatewayServer::new(client));

    let addr: SocketAddr =
        format!("{}:{}", config.server.bind_addr, config.server.http_port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Relay server listening");
    tracing::info!("Endpoints:");
    tracing::info!("  POST /relay");
    tracing::info!("  GET  /relay");
    tracing::info!("  POST /auth");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /metrics");

    // Spawn signal watcher; the server observes the token for draining
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        await_shutdown(signal_token).await;
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.cancelled_owned())
        .await?;

    tracing::info!("Aggregator gateway stopped");
    tracing_guard.shutdown();

    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &GatewayConfig) {
    tracing::info!(
        base_url = %config.aggregator.base_url,
        origin = %config.aggregator.origin,
        bind_addr = %config.server.bind_addr,
        http_port = config.server.http_port,
        upstream_timeout_secs = config.aggregator.timeout.as_secs(),
        unauthorized_retry_limit = config.aggregator.unauthorized_retry_limit,
        poll_max_attempts = config.poller.max_attempts,
        poll_interval_ms = config.poller.interval.as_millis(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
