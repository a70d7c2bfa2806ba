//! Scraper error types.

use std::path::PathBuf;

/// Errors from fetching or parsing scraped data.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading a local data file failed
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the source
    #[error("rate limited by source")]
    RateLimited,

    /// Response body could not be parsed
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// The request was never given a date
    #[error("request has no date")]
    MissingDate,
}

impl ScrapeError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, server errors and rate limiting are transient;
    /// client errors and parse failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Http(_) | ScrapeError::Io { .. } | ScrapeError::RateLimited => true,
            ScrapeError::Api { status, .. } => *status >= 500,
            ScrapeError::Json { .. } | ScrapeError::MissingDate => false,
        }
    }

    /// Whether this is a parse failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, ScrapeError::Json { .. })
    }
}
