//! Bearer Token Store
//!
//! Holds the single service-account bearer credential for the aggregation
//! API. There is no expiry tracking: staleness is discovered reactively
//! when the upstream replies 401, which triggers a refresh at the client
//! layer.
//!
//! The store carries a generation counter alongside the token. A request
//! that hit a 401 records the generation it sent with; if the generation
//! has advanced by the time it holds the refresh gate, another task
//! already re-authenticated and the request can replay without a
//! duplicate login call.

use std::sync::Arc;

use parking_lot::RwLock;

/// The stored token together with its generation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenSnapshot {
    /// Bearer token, when one has been stored.
    pub token: Option<String>,
    /// Store generation. Starts at 0 with no token and increments on
    /// every store or clear.
    pub generation: u64,
}

impl std::fmt::Debug for TokenSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSnapshot")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("generation", &self.generation)
            .finish()
    }
}

/// Shared in-memory store for the bearer credential.
///
/// Cloning the store shares the underlying cell, so every client handle
/// observes the same token.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<TokenSnapshot>>,
}

impl TokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current token, if any.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.inner.read().token.clone()
    }

    /// Get the current token together with its generation.
    #[must_use]
    pub fn snapshot(&self) -> TokenSnapshot {
        self.inner.read().clone()
    }

    /// Store a freshly issued token.
    pub fn store(&self, token: impl Into<String>) {
        let mut guard = self.inner.write();
        guard.token = Some(token.into());
        guard.generation += 1;
    }

    /// Drop the stored token so the next request re-authenticates.
    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.token = None;
        guard.generation += 1;
    }

    /// Whether the store has advanced past the given generation.
    #[must_use]
    pub fn advanced_since(&self, generation: u64) -> bool {
        self.inner.read().generation > generation
    }
}
