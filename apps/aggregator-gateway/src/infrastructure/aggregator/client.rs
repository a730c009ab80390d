//! Aggregation API HTTP Client
//!
//! The relay-level client that all upstream traffic flows through. It owns
//! the header contract (fixed `origin` header, JSON content type, bearer
//! token when one is supplied), normalizes non-JSON upstream bodies into a
//! JSON error envelope, and passes upstream status codes through
//! untouched.
//!
//! `request` layers the token protocol on top of `relay`: the stored
//! token is attached to every call, a 401 triggers one `authenticate`
//! before the request is replayed, and the cycle is bounded so a
//! permanently rejecting upstream cannot cause an infinite loop.
//! Concurrent 401s coalesce on one refresh via the store's generation
//! counter.

use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::{AggregatorSettings, clean_base_url};
use crate::error::GatewayError;
use crate::observability::metrics::{self, RefreshTrigger};

use super::api_types::LoginRequest;
use super::token::TokenStore;

/// Login endpoint for the service-account credentials.
const VERIFY_PASSWORD_ENDPOINT: &str = "/api/v1/user/verify-password";

/// Maximum characters of an upstream body quoted in diagnostics.
const BODY_EXCERPT_LIMIT: usize = 256;

/// Upstream reply with the status passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    /// Upstream HTTP status code.
    pub status: u16,
    /// Upstream body, parsed as JSON or wrapped in an error envelope.
    pub body: Value,
}

impl RelayResponse {
    /// Whether the upstream status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// HTTP client for the aggregation API.
#[derive(Debug, Clone)]
pub struct AggregatorHttpClient {
    client: Client,
    settings: AggregatorSettings,
    tokens: TokenStore,
    refresh_gate: Arc<tokio::sync::Mutex<()>>,
}

impl AggregatorHttpClient {
    /// Create a client from settings and a shared token store.
    pub fn new(settings: AggregatorSettings, tokens: TokenStore) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            settings,
            tokens,
            refresh_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Shared token store handle.
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Forward one request to the aggregation API.
    ///
    /// Always sends `Content-Type: application/json` and the configured
    /// `origin` header; `Authorization: Bearer <token>` only when a token
    /// is supplied. The upstream status passes through untouched, 401
    /// included; no retries happen at this level.
    ///
    /// # Errors
    ///
    /// `Configuration` when the stored base URL does not normalize to an
    /// http(s) URL (no upstream call is made); `Transport` on network
    /// failure.
    pub async fn relay<B>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<RelayResponse, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let base_url = clean_base_url(&self.settings.base_url).map_err(|e| {
            GatewayError::Configuration {
                message: e.to_string(),
            }
        })?;
        let url = format!("{base_url}{endpoint}");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, &self.settings.origin);

        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        metrics::record_upstream_response(status.as_u16(), started.elapsed());

        let parsed = parse_upstream_body(&text, status.as_u16());

        if status == StatusCode::FORBIDDEN {
            tracing::warn!(
                method = %method,
                endpoint = %endpoint,
                status = status.as_u16(),
                token_attached = token.is_some(),
                body = %body_excerpt(&parsed),
                "Upstream returned 403"
            );
        } else {
            tracing::debug!(
                method = %method,
                endpoint = %endpoint,
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                "Upstream exchange"
            );
        }

        Ok(RelayResponse {
            status: status.as_u16(),
            body: parsed,
        })
    }

    /// Issue an authenticated request, refreshing the token on 401.
    ///
    /// The stored token is attached to every attempt. A 401 reply runs
    /// one `authenticate` and replays the identical request; the cycle is
    /// bounded by the configured limit, after which the unauthorized
    /// error itself surfaces. Any other non-2xx reply propagates
    /// unchanged as `Upstream`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` once the refresh bound is exhausted, `Upstream` for
    /// any other non-2xx reply, plus everything `relay` can return.
    pub async fn request<B>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<RelayResponse, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let mut unauthorized_rounds = 0u32;

        loop {
            let snapshot = self.tokens.snapshot();
            let response = self
                .relay(endpoint, method.clone(), body, snapshot.token.as_deref())
                .await?;

            if response.status != StatusCode::UNAUTHORIZED.as_u16() {
                if response.is_success() {
                    return Ok(response);
                }
                return Err(GatewayError::Upstream {
                    status: response.status,
                    body: response.body,
                });
            }

            if unauthorized_rounds >= self.settings.unauthorized_retry_limit {
                tracing::warn!(
                    endpoint = %endpoint,
                    rounds = unauthorized_rounds,
                    "Token refresh bound exhausted, surfacing unauthorized error"
                );
                return Err(unauthorized_error(&response.body));
            }
            unauthorized_rounds += 1;

            tracing::debug!(
                endpoint = %endpoint,
                round = unauthorized_rounds,
                "Upstream returned 401, refreshing token"
            );
            self.refresh_token(snapshot.generation).await?;
        }
    }

    /// Perform the service-account login call and return the upstream
    /// body.
    ///
    /// On success the issued token is stored before returning. On
    /// rejection the stale token is dropped so the next request starts a
    /// fresh login.
    ///
    /// # Errors
    ///
    /// `Authentication` when the upstream rejects the credentials or the
    /// success body carries no `accessToken`.
    pub async fn login(&self) -> Result<Value, GatewayError> {
        let request = LoginRequest::from_credentials(&self.settings.credentials);
        let response = self
            .relay(VERIFY_PASSWORD_ENDPOINT, Method::POST, Some(&request), None)
            .await?;

        if !response.is_success() {
            self.tokens.clear();
            let message = error_message_from(&response.body)
                .unwrap_or_else(|| format!("login rejected with status {}", response.status));
            tracing::warn!(status = response.status, "Service-account login rejected");
            return Err(GatewayError::Authentication { message });
        }

        let Some(token) = response.body.get("accessToken").and_then(Value::as_str) else {
            self.tokens.clear();
            return Err(GatewayError::Authentication {
                message: "login response did not contain an accessToken".to_string(),
            });
        };

        self.tokens.store(token);
        tracing::info!("Service-account token refreshed");
        Ok(response.body)
    }

    /// Authenticate with the configured service credentials and return
    /// the issued bearer token.
    pub async fn authenticate(&self) -> Result<String, GatewayError> {
        let body = self.login().await?;
        body.get("accessToken")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| GatewayError::Authentication {
                message: "login response did not contain an accessToken".to_string(),
            })
    }

    /// Upload raw bytes to a presigned object-storage URL.
    ///
    /// Presigned URLs are self-authorizing, so none of the relay headers
    /// (origin, bearer, JSON content type) apply here. The body goes up
    /// unmodified with the caller's content type.
    pub async fn upload(
        &self,
        url: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "Document upload accepted");
            return Ok(());
        }

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Err(GatewayError::Upstream {
            status: status.as_u16(),
            body: parse_upstream_body(&text, status.as_u16()),
        })
    }

    /// Refresh the stored token, coalescing concurrent attempts.
    ///
    /// The caller passes the generation it sent its failed request with.
    /// If the store advanced while waiting for the gate, another task
    /// already refreshed and no duplicate login is issued.
    async fn refresh_token(&self, observed_generation: u64) -> Result<(), GatewayError> {
        let _gate = self.refresh_gate.lock().await;

        if self.tokens.advanced_since(observed_generation) {
            metrics::record_auth_refresh_coalesced();
            tracing::debug!("Token already refreshed by a concurrent request");
            return Ok(());
        }

        metrics::record_auth_refresh(RefreshTrigger::Unauthorized);
        self.authenticate().await.map(drop)
    }
}

/// Parse an upstream body as JSON, wrapping unparseable text in an error
/// envelope so callers always receive JSON. Empty bodies become `null`.
fn parse_upstream_body(text: &str, status: u16) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| {
        serde_json::json!({
            "error": text,
            "status": status,
        })
    })
}

/// Pull a human-readable message out of an upstream error body.
fn error_message_from(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(Value::as_str)
        .or_else(|| body.get("message").and_then(Value::as_str))
        .map(ToString::to_string)
}

fn unauthorized_error(body: &Value) -> GatewayError {
    GatewayError::Unauthorized {
        message: error_message_from(body)
            .unwrap_or_else(|| "upstream rejected the request as unauthorized".to_string()),
    }
}

fn body_excerpt(body: &Value) -> String {
    let text = body.to_string();
    if text.chars().count() <= BODY_EXCERPT_LIMIT {
        return text;
    }
    text.chars().take(BODY_EXCERPT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ServiceCredentials;

    use super::*;

    fn test_credentials() -> ServiceCredentials {
        ServiceCredentials::new(
            "svc-user".to_string(),
            "svc-pass".to_string(),
            "CH-42".to_string(),
        )
    }

    fn client_for(base_url: &str) -> AggregatorHttpClient {
        let settings = AggregatorSettings::new(base_url, test_credentials());
        AggregatorHttpClient::new(settings, TokenStore::new()).unwrap()
    }

    async fn mount_login(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(VERIFY_PASSWORD_ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "accessToken": token, "userName": "svc-user" })),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn parse_upstream_body_wraps_plain_text() {
        let parsed = parse_upstream_body("Service Unavailable", 503);
        assert_eq!(parsed, json!({ "error": "Service Unavailable", "status": 503 }));
    }

    #[test]
    fn parse_upstream_body_keeps_json() {
        let parsed = parse_upstream_body(r#"{"ok":true}"#, 200);
        assert_eq!(parsed, json!({ "ok": true }));
    }

    #[test]
    fn parse_upstream_body_empty_is_null() {
        assert_eq!(parse_upstream_body("", 204), Value::Null);
    }

    #[test]
    fn error_message_prefers_error_field() {
        let body = json!({ "error": "boom", "message": "other" });
        assert_eq!(error_message_from(&body).as_deref(), Some("boom"));

        let body = json!({ "message": "fallback" });
        assert_eq!(error_message_from(&body).as_deref(), Some("fallback"));

        assert!(error_message_from(&json!({})).is_none());
    }

    #[tokio::test]
    async fn relay_rejects_malformed_base_url_without_dialing() {
        let client = client_for("api.example.com");
        let err = client
            .relay("/v3/ping", Method::GET, None::<&Value>, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }

    #[tokio::test]
    async fn relay_cleans_base_url_before_dialing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pong": true })))
            .expect(1)
            .mount(&server)
            .await;

        // Copy-paste artifacts around an otherwise valid URL.
        let client = client_for(&format!("@{}/", server.uri()));
        let response = client
            .relay("/v3/ping", Method::GET, None::<&Value>, None)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "pong": true }));
    }

    #[tokio::test]
    async fn relay_sends_contract_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/echo"))
            .and(header("content-type", "application/json"))
            .and(header("origin", crate::config::DEFAULT_ORIGIN))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let response = client
            .relay("/v3/echo", Method::POST, Some(&json!({ "a": 1 })), Some("tok-1"))
            .await
            .unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn relay_omits_bearer_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        client
            .relay("/v3/open", Method::GET, None::<&Value>, None)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn relay_wraps_non_json_body_and_passes_status_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/down"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let response = client
            .relay("/v3/down", Method::GET, None::<&Value>, None)
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(
            response.body,
            json!({ "error": "Service Unavailable", "status": 503 })
        );
    }

    #[tokio::test]
    async fn request_refreshes_once_on_401_and_replays_with_new_token() {
        let server = MockServer::start().await;
        mount_login(&server, "abc", 1).await;

        // First attempt carries no token and is rejected.
        Mock::given(method("POST"))
            .and(path("/v3/guarded"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "token expired" })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;

        // The replay must carry the freshly issued token.
        Mock::given(method("POST"))
            .and(path("/v3/guarded"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let response = client
            .request("/v3/guarded", Method::POST, Some(&json!({ "q": 1 })))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(client.tokens().current().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn request_surfaces_unauthorized_after_bounded_refreshes() {
        let server = MockServer::start().await;
        // Login always succeeds with a token the guarded endpoint rejects.
        mount_login(&server, "stale", 3).await;

        Mock::given(method("POST"))
            .and(path("/v3/guarded"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "account disabled" })),
            )
            .expect(4)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .request("/v3/guarded", Method::POST, None::<&Value>)
            .await
            .unwrap_err();

        match err {
            GatewayError::Unauthorized { message } => assert_eq!(message, "account disabled"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_passes_non_401_errors_through_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/quotes"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "error": "invalid pincode" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .request("/v3/quotes", Method::POST, Some(&json!({})))
            .await
            .unwrap_err();

        match err {
            GatewayError::Upstream { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, json!({ "error": "invalid pincode" }));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // No login attempt was made for a non-401 failure.
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.url.path() == "/v3/quotes"));
    }

    #[tokio::test]
    async fn authenticate_stores_token_from_login_body() {
        let server = MockServer::start().await;
        mount_login(&server, "abc", 1).await;

        let client = client_for(&server.uri());
        let token = client.authenticate().await.unwrap();
        assert_eq!(token, "abc");
        assert_eq!(client.tokens().current().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn authenticate_surfaces_server_message_on_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(VERIFY_PASSWORD_ENDPOINT))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({ "error": "bad credentials" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        client.tokens().store("stale");
        let err = client.authenticate().await.unwrap_err();

        match err {
            GatewayError::Authentication { message } => assert_eq!(message, "bad credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
        // The stale token is dropped so the next request starts fresh.
        assert!(client.tokens().current().is_none());
    }

    #[tokio::test]
    async fn authenticate_rejects_login_body_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(VERIFY_PASSWORD_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userName": "svc" })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, GatewayError::Authentication { .. }));
    }

    #[tokio::test]
    async fn upload_sends_raw_body_without_relay_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/kyc/doc-1.pdf"))
            .and(header("content-type", "application/pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for("https://unused.example.com");
        let url = format!("{}/bucket/kyc/doc-1.pdf", server.uri());
        client
            .upload(&url, b"%PDF-1.7".to_vec(), "application/pdf")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].body, b"%PDF-1.7");
        assert!(!requests[0].headers.contains_key("origin"));
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn upload_failure_surfaces_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/kyc/doc-2.pdf"))
            .respond_with(ResponseTemplate::new(403).set_body_string("expired signature"))
            .mount(&server)
            .await;

        let client = client_for("https://unused.example.com");
        let url = format!("{}/bucket/kyc/doc-2.pdf", server.uri());
        let err = client
            .upload(&url, Vec::new(), "application/pdf")
            .await
            .unwrap_err();

        match err {
            GatewayError::Upstream { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, json!({ "error": "expired signature", "status": 403 }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_401s_coalesce_on_one_refresh() {
        let server = MockServer::start().await;
        mount_login(&server, "abc", 1).await;

        Mock::given(method("GET"))
            .and(path("/v3/guarded"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "token expired" })),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v3/guarded"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let (first, second) = tokio::join!(
            client.request("/v3/guarded", Method::GET, None::<&Value>),
            client.request("/v3/guarded", Method::GET, None::<&Value>),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(client.tokens().current().as_deref(), Some("abc"));
    }
}
