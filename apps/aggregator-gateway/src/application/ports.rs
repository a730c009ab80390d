//! Quote Source Port
//!
//! Defines the interface for fetching quote snapshots that the polling
//! loop requires. This port can be implemented by different adapters:
//!
//! - `AggregatorClient` - the live aggregation API client
//! - test doubles via `mockall`

use async_trait::async_trait;

use crate::domain::Quote;
use crate::error::GatewayError;

/// Port for fetching quote snapshots by id.
///
/// The quote poller depends on this abstraction rather than on the
/// concrete HTTP client.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the current snapshot of a quote.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be fetched. The poller
    /// aborts its run on the first such failure.
    async fn quote_by_id(&self, quote_id: &str) -> Result<Quote, GatewayError>;
}
