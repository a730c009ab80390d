//! Gateway Configuration Settings
//!
//! Configuration types for the aggregator gateway, loaded from environment
//! variables. The upstream base URL is normalized at load time; everything
//! else falls back to documented defaults.

use std::time::Duration;

/// Default `origin` header value sent with every upstream call.
pub const DEFAULT_ORIGIN: &str = "https://www.polisure.in";

/// Default per-request timeout on the upstream client.
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on 401 refresh/replay cycles per logical request.
const DEFAULT_UNAUTHORIZED_RETRY_LIMIT: u32 = 3;

/// Service-account credentials for the aggregation API login call.
#[derive(Clone)]
pub struct ServiceCredentials {
    user_id: String,
    password: String,
    sales_channel_id: String,
}

impl ServiceCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(user_id: String, password: String, sales_channel_id: String) -> Self {
        Self {
            user_id,
            password,
            sales_channel_id,
        }
    }

    /// Get the service user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the service password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Get the sales-channel id.
    #[must_use]
    pub fn sales_channel_id(&self) -> &str {
        &self.sales_channel_id
    }
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("user_id", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .field("sales_channel_id", &self.sales_channel_id)
            .finish()
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Bind address for the relay HTTP server.
    pub bind_addr: String,
    /// Port serving the relay, auth, health, and metrics routes.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            http_port: 8686,
        }
    }
}

/// Upstream aggregation API settings.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Base URL of the aggregation API. Cleaned by `from_env`; direct
    /// constructors store the value as given and the client re-validates
    /// before dialing.
    pub base_url: String,
    /// Literal `origin` header value attached to every upstream call.
    pub origin: String,
    /// Service-account credentials.
    pub credentials: ServiceCredentials,
    /// Per-request timeout on the upstream client.
    pub timeout: Duration,
    /// Bound on 401 refresh/replay cycles for one logical request.
    pub unauthorized_retry_limit: u32,
}

impl AggregatorSettings {
    /// Create settings with defaults for everything but the URL and
    /// credentials.
    #[must_use]
    pub fn new(base_url: impl Into<String>, credentials: ServiceCredentials) -> Self {
        Self {
            base_url: base_url.into(),
            origin: DEFAULT_ORIGIN.to_string(),
            credentials,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            unauthorized_retry_limit: DEFAULT_UNAUTHORIZED_RETRY_LIMIT,
        }
    }

    /// Override the origin header value.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Override the upstream timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the 401 retry bound.
    #[must_use]
    pub const fn with_unauthorized_retry_limit(mut self, limit: u32) -> Self {
        self.unauthorized_retry_limit = limit;
        self
    }
}

/// Quote polling settings.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Maximum fetches performed by one poll call.
    pub max_attempts: u32,
    /// Delay between successive fetches.
    pub interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_secs(3),
        }
    }
}

impl PollerSettings {
    /// Override the attempt bound.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the inter-fetch delay.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Upstream aggregation API settings.
    pub aggregator: AggregatorSettings,
    /// Quote polling settings.
    pub poller: PollerSettings,
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// the base URL does not normalize to an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_base_url = std::env::var("AGGREGATOR_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("AGGREGATOR_BASE_URL".to_string()))?;
        let base_url = clean_base_url(&raw_base_url)?;

        let user_id = required_env("AGGREGATOR_SERVICE_USER_ID")?;
        let password = required_env("AGGREGATOR_SERVICE_PASSWORD")?;
        let sales_channel_id = required_env("AGGREGATOR_SALES_CHANNEL_ID")?;

        let origin = std::env::var("AGGREGATOR_ORIGIN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());

        let server = ServerSettings {
            bind_addr: std::env::var("GATEWAY_BIND_ADDR")
                .unwrap_or_else(|_| ServerSettings::default().bind_addr),
            http_port: parse_env_u16("GATEWAY_HTTP_PORT", ServerSettings::default().http_port),
        };

        let aggregator = AggregatorSettings {
            base_url,
            origin,
            credentials: ServiceCredentials::new(user_id, password, sales_channel_id),
            timeout: parse_env_duration_secs("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT),
            unauthorized_retry_limit: parse_env_u32(
                "UNAUTHORIZED_RETRY_LIMIT",
                DEFAULT_UNAUTHORIZED_RETRY_LIMIT,
            ),
        };

        let poller_defaults = PollerSettings::default();
        let poller = PollerSettings {
            max_attempts: parse_env_u32("POLL_MAX_ATTEMPTS", poller_defaults.max_attempts),
            interval: parse_env_duration_millis("POLL_INTERVAL_MS", poller_defaults.interval),
        };

        Ok(Self {
            server,
            aggregator,
            poller,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Base URL does not normalize to an http(s) URL.
    #[error("invalid base URL {value:?}: must start with http:// or https://")]
    InvalidBaseUrl {
        /// The offending value after cleaning.
        value: String,
    },
}

/// Normalize a configured base URL.
///
/// Tolerates common copy-paste artifacts: surrounding whitespace, stray
/// leading `@` characters, and trailing slashes. The cleaned value must
/// start with `http://` or `https://`.
pub fn clean_base_url(raw: &str) -> Result<String, ConfigError> {
    let cleaned = raw
        .trim()
        .trim_start_matches('@')
        .trim_end_matches('/')
        .trim();

    if cleaned.is_empty() {
        return Err(ConfigError::EmptyValue("AGGREGATOR_BASE_URL".to_string()));
    }

    if !cleaned.starts_with("http://") && !cleaned.starts_with("https://") {
        return Err(ConfigError::InvalidBaseUrl {
            value: cleaned.to_string(),
        });
    }

    Ok(cleaned.to_string())
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
