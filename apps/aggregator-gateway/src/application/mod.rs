//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the polling use case and the port interfaces
//! that define how it reaches external systems.

/// Port interfaces for external systems.
pub mod ports;

/// Bounded quote-polling loop with cancellation.
pub mod quote_poller;

pub use ports::QuoteSource;
pub use quote_poller::{PollError, QuotePoller};
