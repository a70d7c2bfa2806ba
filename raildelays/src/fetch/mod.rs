//! Fetch stage: rate-limited, retrying reads of one date at a time.
//!
//! `RateLimitedFetcher` turns one request into one parsed result, pausing
//! before every attempt and retrying transient failures. `DateDrivenComposer`
//! drives it from a `DateSource`, one request per date.

mod composer;
mod error;
mod fetcher;
mod retry;

pub use composer::{DateDrivenComposer, DateRange, DateSource, DatedBatch, VecDateSource};
pub use error::FetchError;
pub use fetcher::{FetcherConfig, RateLimit, RateLimitedFetcher};
pub use retry::{BackoffPolicy, CancelHandle, CancelSignal, Cancelled, RetryPolicy, RetryState};
