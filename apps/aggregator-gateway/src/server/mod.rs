//! Server implementation.
//!
//! This module provides the HTTP/JSON relay surface: the `/relay`
//! passthrough routes, the `/auth` service login, and health/metrics
//! endpoints.

mod http;

pub use http::{
    ApiError, GatewayServer, HealthResponse, RelayQuery, RelayRequest, create_router,
};
