//! Domain Layer - Core quote types and business logic.
//!
//! This layer contains the core domain types for insurance quotes with
//! no infrastructure dependencies. All types here are pure Rust with
//! serialization support.

/// Quote and plan types (incrementally-filled aggregation results).
pub mod quote;

pub use quote::{FieldValue, Plan, PlanAddOn, PlanFeature, Quote, QuoteErrorInfo};
