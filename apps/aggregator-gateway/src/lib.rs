#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Aggregator Gateway - Insurance Quote Relay
//!
//! A same-origin HTTP gateway that relays storefront calls to an external
//! insurance aggregation API, owning the upstream header contract, the
//! service-account token lifecycle, and bounded quote polling.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core quote types with no external dependencies
//!   - `quote`: `Quote` and `Plan` aggregation snapshots, monotonic merge
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `QuoteSource` interface for quote fetching
//!   - `quote_poller`: Bounded polling with cancellation
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `aggregator`: HTTP client for the aggregation API, token store,
//!     wire types, typed operations
//!
//! - **Server**: Same-origin relay surface (`/relay`, `/auth`, health,
//!   metrics)
//!
//! # Data Flow
//!
//! ```text
//! Storefront ──► /relay ──► AggregatorHttpClient ──► Aggregation API
//!                              │
//!                              └── TokenStore (service-account bearer,
//!                                  refreshed reactively on 401)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core quote types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Configuration loaded from environment variables.
pub mod config;

/// Gateway-wide error types.
pub mod error;

/// Metrics and tracing initialization.
pub mod observability;

/// HTTP relay server.
pub mod server;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{FieldValue, Plan, PlanAddOn, PlanFeature, Quote, QuoteErrorInfo};

// Configuration
pub use config::{
    AggregatorSettings, ConfigError, GatewayConfig, PollerSettings, ServerSettings,
    ServiceCredentials,
};

// Errors
pub use error::GatewayError;

// Aggregator client (for integration tests)
pub use infrastructure::aggregator::{
    AggregatorClient, AggregatorHttpClient, RelayResponse, TokenSnapshot, TokenStore,
};

// Quote polling
pub use application::{PollError, QuotePoller, QuoteSource};

// Relay server (for integration tests)
pub use server::{GatewayServer, RelayRequest, create_router};

// Metrics
pub use observability::{get_metrics_handle, init_metrics};

// Tracing
pub use observability::{TracingConfig, TracingGuard, config_from_env, init_tracing};
