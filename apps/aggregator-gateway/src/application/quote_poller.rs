//! Quote Poller
//!
//! Drives the delivery of a quote's plan list as insurers respond
//! asynchronously upstream. One poll call fetches the quote snapshot,
//! merges it into the running view, hands the merged view to the caller's
//! callback, sleeps, and repeats, for a fixed number of attempts. The
//! attempt bound is the sole normal termination: there is no "all
//! insurers responded" heuristic, because the upstream does not expose
//! one.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::application::ports::QuoteSource;
use crate::config::PollerSettings;
use crate::domain::Quote;
use crate::error::GatewayError;
use crate::observability::metrics;

/// Quote poller errors.
#[derive(Debug, Error)]
pub enum PollError {
    /// A snapshot fetch failed; the poll run is aborted.
    #[error("quote fetch failed on attempt {attempt}: {source}")]
    Fetch {
        /// 1-based attempt number that failed.
        attempt: u32,
        /// Underlying client error.
        #[source]
        source: GatewayError,
    },

    /// The poll was cancelled before any snapshot arrived.
    #[error("quote poll cancelled after {attempts_completed} attempts")]
    Cancelled {
        /// Attempts completed before cancellation.
        attempts_completed: u32,
    },
}

/// Polls quote snapshots until the attempt bound is reached.
#[derive(Debug, Clone)]
pub struct QuotePoller<S: QuoteSource> {
    /// Snapshot source.
    source: Arc<S>,
    /// Attempt bound and inter-attempt delay.
    config: PollerSettings,
}

impl<S: QuoteSource> QuotePoller<S> {
    /// Create a poller over a snapshot source.
    #[must_use]
    pub const fn new(source: Arc<S>, config: PollerSettings) -> Self {
        Self { source, config }
    }

    /// Poll a quote until the attempt bound is reached.
    ///
    /// Each attempt runs strictly in sequence: fetch, merge into the
    /// running snapshot, invoke `on_update` with the merged view, then
    /// sleep the configured interval (skipped after the final attempt).
    /// The callback fires on every successful attempt whether or not the
    /// snapshot changed; callers diff if they care.
    ///
    /// Cancellation is observed during the fetch and during the sleep.
    /// Cancelling after at least one snapshot resolves with the last
    /// merged view; cancelling before any yields `PollError::Cancelled`.
    ///
    /// # Errors
    ///
    /// `PollError::Fetch` on the first fetch failure. The callback is not
    /// invoked for a failed attempt.
    pub async fn poll_quote<F>(
        &self,
        quote_id: &str,
        mut on_update: F,
        cancel: &CancellationToken,
    ) -> Result<Quote, PollError>
    where
        F: FnMut(&Quote) + Send,
    {
        let mut merged: Option<Quote> = None;

        for attempt in 1..=self.config.max_attempts {
            let fetched = tokio::select! {
                () = cancel.cancelled() => {
                    return finish_cancelled(merged, attempt - 1);
                }
                result = self.source.quote_by_id(quote_id) => result,
            };

            let snapshot = fetched.map_err(|source| PollError::Fetch { attempt, source })?;
            metrics::record_quote_poll_attempt();

            if snapshot.id != quote_id {
                tracing::warn!(
                    requested = %quote_id,
                    received = %snapshot.id,
                    "Snapshot id does not match the polled quote"
                );
            }

            let current = match merged.take() {
                Some(previous) => previous.merged_with(snapshot),
                None => snapshot,
            };
            on_update(&current);
            tracing::debug!(
                quote_id = %quote_id,
                attempt = attempt,
                plans = current.plans.len(),
                "Quote poll attempt completed"
            );
            merged = Some(current);

            if attempt < self.config.max_attempts {
                tokio::select! {
                    () = cancel.cancelled() => {
                        return finish_cancelled(merged, attempt);
                    }
                    () = tokio::time::sleep(self.config.interval) => {}
                }
            }
        }

        merged.ok_or(PollError::Cancelled {
            attempts_completed: 0,
        })
    }
}

fn finish_cancelled(merged: Option<Quote>, attempts_completed: u32) -> Result<Quote, PollError> {
    match merged {
        Some(quote) => {
            tracing::info!(
                quote_id = %quote.id,
                attempts = attempts_completed,
                "Quote poll cancelled, resolving with the last snapshot"
            );
            Ok(quote)
        }
        None => Err(PollError::Cancelled { attempts_completed }),
    }
}
