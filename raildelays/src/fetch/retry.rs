//! Retry, backoff and cancellation primitives for the fetch stage.
//!
//! A fetch is retried as an explicit state machine:
//!
//! ```text
//! Idle ──start──▶ Attempting(1) ──ok──▶ Succeeded
//!                     │
//!                     └─err, retryable, n < max──▶ Attempting(n + 1)
//!                     └─err otherwise────────────▶ Failed
//! ```
//!
//! The wait between attempts comes from a `BackoffPolicy` as a function of
//! the attempt number. Every wait races a `CancelSignal` so an aborted run
//! never sits out a sleep.

use std::time::Duration;

use tokio::sync::watch;

use crate::scraper::ScrapeError;

/// Default attempt ceiling.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Which failures are retried and how many attempts are made in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Treat parse failures as retryable
    pub retry_parse_errors: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            retry_parse_errors: false,
        }
    }

    pub fn with_retry_parse_errors(mut self, retry: bool) -> Self {
        self.retry_parse_errors = retry;
        self
    }

    /// Whether this policy considers `error` transient, attempts aside.
    pub fn is_retryable(&self, error: &ScrapeError) -> bool {
        error.is_retryable() || (self.retry_parse_errors && error.is_parse())
    }

    /// Whether `error` after attempt number `attempt` should be retried.
    pub fn should_retry(&self, error: &ScrapeError, attempt: u32) -> bool {
        attempt < self.max_attempts && self.is_retryable(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// How the wait between attempts grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same wait after every failed attempt
    Fixed { delay: Duration },
    /// Wait doubles after every failed attempt, up to `max`
    Exponential { initial: Duration, max: Duration },
}

impl BackoffPolicy {
    /// Wait after the failure of attempt number `attempt` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use raildelays::fetch::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let backoff = BackoffPolicy::Exponential {
    ///     initial: Duration::from_secs(1),
    ///     max: Duration::from_secs(5),
    /// };
    /// assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
    /// assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
    /// assert_eq!(backoff.delay_for(10), Duration::from_secs(5));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed { delay } => *delay,
            BackoffPolicy::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(*max)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// State of one retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    /// Attempt number in progress, 1-based
    Attempting(u32),
    Succeeded,
    Failed,
}

impl RetryState {
    /// Begin the first attempt.
    pub fn start(self) -> Self {
        match self {
            RetryState::Idle => RetryState::Attempting(1),
            other => other,
        }
    }

    /// Record a successful attempt.
    pub fn succeed(self) -> Self {
        match self {
            RetryState::Attempting(_) => RetryState::Succeeded,
            other => other,
        }
    }

    /// Record a failed attempt and move to the next state.
    ///
    /// Returns the wait before the next attempt, or `None` when the
    /// operation has failed for good.
    pub fn fail(
        &mut self,
        error: &ScrapeError,
        retry: &RetryPolicy,
        backoff: &BackoffPolicy,
    ) -> Option<Duration> {
        let RetryState::Attempting(n) = *self else {
            return None;
        };

        if retry.should_retry(error, n) {
            *self = RetryState::Attempting(n + 1);
            Some(backoff.delay_for(n))
        } else {
            *self = RetryState::Failed;
            None
        }
    }

    /// Attempt number in progress, if any.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            RetryState::Attempting(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed)
    }
}

/// Marker returned when a wait was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Triggers cancellation of a run.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation of a run.
///
/// Cheap to clone; every clone sees the same cancellation.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Create a handle/signal pair.
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that is never cancelled.
    pub fn never() -> CancelSignal {
        let (_, signal) = Self::pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the run is cancelled. Never completes if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(Cancelled),
        }
    }
}
