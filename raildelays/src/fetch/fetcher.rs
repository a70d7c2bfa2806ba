//! Rate-limited, retrying single-shot fetcher.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::scraper::{StreamParser, Transport};

use super::error::FetchError;
use super::retry::{BackoffPolicy, CancelSignal, RetryPolicy, RetryState};

/// Default lower bound of the pause before each fetch.
const DEFAULT_MIN_PAUSE: Duration = Duration::from_secs(1);

/// Default upper bound of the pause before each fetch.
const DEFAULT_MAX_PAUSE: Duration = Duration::from_secs(5);

/// Bounds of the random pause taken before every fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub min: Duration,
    pub max: Duration,
}

impl RateLimit {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw a pause uniformly from `[min, max]`.
    pub fn pick(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min >= max {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PAUSE, DEFAULT_MAX_PAUSE)
    }
}

/// Collaborators and policies for a `RateLimitedFetcher`.
///
/// Every `Option` field must be set; `RateLimitedFetcher::new` reports the
/// first one missing.
pub struct FetcherConfig<T: Transport, P> {
    pub transport: Option<T>,
    pub parser: Option<P>,
    /// Request the fetcher starts with and derives later requests from
    pub request: Option<T::Request>,
    pub retry: Option<RetryPolicy>,
    pub backoff: Option<BackoffPolicy>,
    pub rate_limit: RateLimit,
}

impl<T: Transport, P> FetcherConfig<T, P> {
    pub fn new() -> Self {
        Self {
            transport: None,
            parser: None,
            request: None,
            retry: None,
            backoff: None,
            rate_limit: RateLimit::default(),
        }
    }

    pub fn with_transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_parser(mut self, parser: P) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_request(mut self, request: T::Request) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

impl<T: Transport, P> Default for FetcherConfig<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetches and parses one request at a time.
///
/// The fetcher holds at most one pending request. `read` consumes it: it
/// pauses for a random duration, fetches and parses, retrying transient
/// failures per the retry policy, and returns the parsed result. A `read`
/// with no pending request returns `Ok(None)`, which callers treat as end
/// of stream.
///
/// Not meant to be shared: one pipeline owns one fetcher.
pub struct RateLimitedFetcher<T: Transport, P> {
    transport: T,
    parser: P,
    prototype: T::Request,
    pending: Option<T::Request>,
    retry: RetryPolicy,
    backoff: BackoffPolicy,
    rate_limit: RateLimit,
    cancel: CancelSignal,
}

impl<T: Transport, P> fmt::Debug for RateLimitedFetcher<T, P>
where
    T::Request: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedFetcher")
            .field("pending", &self.pending)
            .field("retry", &self.retry)
            .field("backoff", &self.backoff)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl<T, P> RateLimitedFetcher<T, P>
where
    T: Transport,
    T::Request: Clone + std::fmt::Debug,
    P: StreamParser,
{
    /// Validate the configuration and build a fetcher.
    ///
    /// The configured request becomes both the prototype and the first
    /// pending request.
    pub fn new(config: FetcherConfig<T, P>, cancel: CancelSignal) -> Result<Self, FetchError> {
        let parser = config.parser.ok_or(FetchError::Misconfigured("parser"))?;
        let prototype = config.request.ok_or(FetchError::Misconfigured("request"))?;
        let transport = config
            .transport
            .ok_or(FetchError::Misconfigured("transport"))?;
        let retry = config.retry.ok_or(FetchError::Misconfigured("retry policy"))?;
        let backoff = config
            .backoff
            .ok_or(FetchError::Misconfigured("backoff policy"))?;

        let rate_limit = config.rate_limit;
        if rate_limit.min > rate_limit.max {
            return Err(FetchError::InvalidRateLimit {
                min_ms: rate_limit.min.as_millis() as u64,
                max_ms: rate_limit.max.as_millis() as u64,
            });
        }

        Ok(Self {
            transport,
            parser,
            pending: Some(prototype.clone()),
            prototype,
            retry,
            backoff,
            rate_limit,
            cancel,
        })
    }

    /// The request later requests are derived from.
    pub fn prototype(&self) -> &T::Request {
        &self.prototype
    }

    /// Queue `request` for the next `read`, replacing any pending one.
    pub fn set_request(&mut self, request: T::Request) {
        self.pending = Some(request);
    }

    pub fn has_request(&self) -> bool {
        self.pending.is_some()
    }

    /// Fetch and parse the pending request.
    ///
    /// The request is consumed whatever the outcome.
    pub async fn read(&mut self) -> Result<Option<P::Output>, FetchError> {
        let Some(request) = self.pending.take() else {
            return Ok(None);
        };

        let mut state = RetryState::Idle.start();

        while let Some(attempt) = state.attempt() {
            let pause = self.rate_limit.pick();
            debug!(?request, attempt, pause_ms = pause.as_millis() as u64, "waiting before fetch");
            self.cancel
                .sleep(pause)
                .await
                .map_err(|_| FetchError::Cancelled)?;

            let result = match self.transport.stream(&request).await {
                Ok(body) => self.parser.parse(&body),
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(output) => {
                    state = state.succeed();
                    debug!(attempt, ?state, "fetch succeeded");
                    return Ok(Some(output));
                }
                Err(e) => e,
            };

            match state.fail(&error, &self.retry, &self.backoff) {
                Some(wait) => {
                    warn!(
                        attempt,
                        error = %error,
                        wait_ms = wait.as_millis() as u64,
                        "fetch failed, retrying"
                    );
                    self.cancel
                        .sleep(wait)
                        .await
                        .map_err(|_| FetchError::Cancelled)?;
                }
                None if self.retry.is_retryable(&error) => {
                    return Err(FetchError::Exhausted {
                        attempts: attempt,
                        source: error,
                    });
                }
                None => return Err(FetchError::Fatal(error)),
            }
        }

        // The loop only exits through a return.
        Err(FetchError::Misconfigured("retry state"))
    }
}
