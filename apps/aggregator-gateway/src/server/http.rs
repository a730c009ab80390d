//! HTTP/JSON relay server implementation.
//!
//! Same-origin surface consumed by the storefront: a generic `/relay`
//! passthrough to the aggregation API, a service-account `/auth` login
//! endpoint, and health/metrics routes for orchestrators.
//!
//! Relay handlers forward with [`AggregatorHttpClient::relay`] rather than
//! the refresh/replay variant: the browser owns its token lifecycle over
//! this surface, so a 401 passes through to it untouched.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::infrastructure::aggregator::AggregatorHttpClient;
use crate::observability::get_metrics_handle;
use crate::observability::metrics::{self, RefreshTrigger, RelayOutcome};

/// Shared state for the relay server.
#[derive(Clone)]
pub struct GatewayServer {
    client: AggregatorHttpClient,
    started_at: Instant,
}

impl GatewayServer {
    /// Create a new relay server around a configured upstream client.
    #[must_use]
    pub fn new(client: AggregatorHttpClient) -> Self {
        Self {
            client,
            started_at: Instant::now(),
        }
    }
}

/// Create the Axum router with all endpoints.
#[must_use]
pub fn create_router(server: GatewayServer) -> Router {
    Router::new()
        .route("/relay", post(relay_post).get(relay_get))
        .route("/auth", post(service_login))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(server)
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of a `POST /relay` call.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayRequest {
    /// Upstream path, joined onto the configured base URL.
    pub endpoint: String,
    /// JSON payload forwarded as the upstream request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// HTTP method name, matched case-insensitively. Defaults to POST.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Caller-supplied bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Query parameters of a `GET /relay` call.
#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    /// Upstream path, joined onto the configured base URL.
    pub endpoint: String,
    /// Caller-supplied bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process is serving requests.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Seconds since the server state was created.
    pub uptime_seconds: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Relay a storefront call to the aggregation API.
async fn relay_post(
    State(server): State<GatewayServer>,
    Json(req): Json<RelayRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let method = parse_relay_method(req.method.as_deref()).map_err(|err| {
        // Caller strings are unbounded, so the label stays fixed.
        metrics::record_relay_request("invalid", RelayOutcome::InvalidMethod);
        err
    })?;

    forward(
        &server,
        &req.endpoint,
        method,
        req.data.as_ref(),
        req.token.as_deref(),
    )
    .await
}

/// Read-only relay variant for upstream GET endpoints.
async fn relay_get(
    State(server): State<GatewayServer>,
    Query(query): Query<RelayQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    forward(
        &server,
        &query.endpoint,
        Method::GET,
        None,
        query.token.as_deref(),
    )
    .await
}

/// Log in with the server-side service account and return the upstream
/// login body, `accessToken` included.
async fn service_login(
    State(server): State<GatewayServer>,
) -> Result<Json<Value>, ApiError> {
    metrics::record_auth_refresh(RefreshTrigger::Manual);

    let body = server.client.login().await.map_err(ApiError::from_error)?;
    Ok(Json(body))
}

/// Health check endpoint.
async fn health_check(State(server): State<GatewayServer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: server.started_at.elapsed().as_secs(),
    })
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

// =============================================================================
// Relay Plumbing
// =============================================================================

/// Forward one call upstream and translate the result into an HTTP reply.
///
/// Upstream statuses pass through verbatim, 401 included. Only failures
/// that never produced an upstream reply (configuration, transport) become
/// the gateway's own 500 envelope.
async fn forward(
    server: &GatewayServer,
    endpoint: &str,
    method: Method,
    data: Option<&Value>,
    token: Option<&str>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request_id = Uuid::new_v4();
    tracing::debug!(%request_id, endpoint, method = %method, "Relaying upstream call");

    let response = server
        .client
        .relay(endpoint, method.clone(), data, token)
        .await
        .map_err(|err| {
            let outcome = match &err {
                GatewayError::Configuration { .. } => RelayOutcome::ConfigRejected,
                _ => RelayOutcome::TransportFailed,
            };
            metrics::record_relay_request(method.as_str(), outcome);
            tracing::warn!(%request_id, error = %err, "Relay failed before an upstream reply");
            ApiError::from_error(err)
        })?;

    metrics::record_relay_request(method.as_str(), RelayOutcome::Relayed);
    tracing::debug!(%request_id, status = response.status, "Relay completed");

    let mut body = response.body;
    if response.status == 403 {
        enrich_forbidden_body(&mut body, endpoint, token.is_some());
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(body)))
}

/// Resolve the method string of a relay request.
fn parse_relay_method(raw: Option<&str>) -> Result<Method, ApiError> {
    let Some(raw) = raw else {
        return Ok(Method::POST);
    };

    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        other => Err(ApiError::bad_request(format!(
            "unsupported relay method: {other}"
        ))),
    }
}

/// Add diagnostic fields to a 403 body. Object bodies only, and upstream
/// fields win over the injected ones.
fn enrich_forbidden_body(body: &mut Value, endpoint: &str, token_attached: bool) {
    let Some(fields) = body.as_object_mut() else {
        return;
    };

    fields.entry("message").or_insert_with(|| {
        Value::String("Access denied by the aggregation API".to_string())
    });
    fields.entry("details").or_insert_with(|| {
        json!({
            "endpoint": endpoint,
            "token_attached": token_attached,
            "hint": "verify the configured origin header is allow-listed upstream",
        })
    });
}

// =============================================================================
// Error Mapping
// =============================================================================

/// API error rendered as the gateway's JSON error envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Create from a gateway error, mapping the variant to an HTTP status.
    #[must_use]
    pub fn from_error(error: GatewayError) -> Self {
        let status = match &error {
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::Configuration { .. }
            | GatewayError::Authentication { .. }
            | GatewayError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: error.envelope_message(),
        }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self::from_error(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "error": self.message,
            "status": self.status.as_u16(),
        });

        (self.status, Json(body)).into_response()
    }
}
