//! Fetch stage error types.

use crate::scraper::ScrapeError;

/// Errors from the rate-limited fetch stage.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A required collaborator was not configured
    #[error("fetcher misconfigured: {0} is not set")]
    Misconfigured(&'static str),

    /// Rate-limit bounds are inverted
    #[error("invalid rate limit: minimum {min_ms}ms exceeds maximum {max_ms}ms")]
    InvalidRateLimit { min_ms: u64, max_ms: u64 },

    /// Every allowed attempt failed with a retryable error
    #[error("fetch failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ScrapeError,
    },

    /// A non-retryable error occurred
    #[error("fetch failed: {0}")]
    Fatal(#[source] ScrapeError),

    /// The run was aborted while waiting
    #[error("fetch cancelled")]
    Cancelled,
}
