//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port
//! interfaces defined in the application layer.

/// Aggregation API integration (token store, relay client, typed operations).
pub mod aggregator;
