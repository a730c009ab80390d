//! Gateway-wide error types.

use thiserror::Error;

/// Errors produced while talking to the aggregation API.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Settings are missing or malformed. Raised before any upstream call.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The service-account login was rejected.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Server-provided rejection message when available.
        message: String,
    },

    /// Upstream replied with a non-2xx, non-401 status.
    ///
    /// Status and body are preserved verbatim so callers can pass them
    /// through.
    #[error("Upstream error: {status}")]
    Upstream {
        /// Upstream HTTP status code.
        status: u16,
        /// Upstream response body.
        body: serde_json::Value,
    },

    /// Upstream replied 401. Triggers the token refresh protocol; surfaces
    /// only once the refresh bound is exhausted.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Rejection message from the upstream body when available.
        message: String,
    },

    /// Network-level failure (connect, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Message to place in the `error` field of a synthesized JSON envelope.
    #[must_use]
    pub fn envelope_message(&self) -> String {
        match self {
            Self::Configuration { message }
            | Self::Authentication { message }
            | Self::Unauthorized { message } => message.clone(),
            Self::Upstream { status, .. } => format!("Upstream returned status {status}"),
            Self::Transport(message) => message.clone(),
        }
    }
}
