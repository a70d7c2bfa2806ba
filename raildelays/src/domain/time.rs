//! Time-of-day and delay handling.
//!
//! The scraped source reports each stop as an expected time of day plus a
//! delay. Everything in a report is scoped to a single calendar date, so
//! times here are plain `NaiveTime` values and comparisons never cross
//! midnight.

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Parse a time of day from "HH:MM" format.
///
/// # Examples
///
/// ```
/// use raildelays::domain::parse_hhmm;
///
/// assert!(parse_hhmm("00:00").is_ok());
/// assert!(parse_hhmm("23:59").is_ok());
///
/// assert!(parse_hhmm("1430").is_err());
/// assert!(parse_hhmm("14:3").is_err());
/// assert!(parse_hhmm("25:00").is_err());
/// ```
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, TimeError> {
    if s.len() != 5 {
        return Err(TimeError::new("expected HH:MM format"));
    }

    let bytes = s.as_bytes();

    if bytes[2] != b':' {
        return Err(TimeError::new("expected colon at position 2"));
    }

    let hour =
        parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
    if hour > 23 {
        return Err(TimeError::new("hour must be 0-23"));
    }

    let minute =
        parse_two_digits(&bytes[3..5]).ok_or_else(|| TimeError::new("invalid minute digits"))?;
    if minute > 59 {
        return Err(TimeError::new("minute must be 0-59"));
    }

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| TimeError::new("invalid time"))
}

fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

/// Compare two optional values, ordering `None` after every `Some`.
pub fn nulls_last<T: Ord>(lho: Option<&T>, rho: Option<&T>) -> Ordering {
    match (lho, rho) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => l.cmp(r),
    }
}

/// Whole minutes from `expected` to `effective`, never negative.
///
/// Sub-minute remainders are truncated.
pub fn delay_minutes(expected: NaiveTime, effective: NaiveTime) -> u64 {
    effective
        .signed_duration_since(expected)
        .num_minutes()
        .max(0) as u64
}

/// An expected time of day paired with a delay.
///
/// A `TimeDelay` without an expected time sorts after every timed value,
/// which keeps stops lacking a schedule at the end of any sorted list.
///
/// # Examples
///
/// ```
/// use raildelays::domain::TimeDelay;
/// use chrono::NaiveTime;
///
/// let t = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
/// let delayed = TimeDelay::new(Some(t), 5 * 60 * 1000);
/// assert_eq!(delayed.effective(), NaiveTime::from_hms_opt(8, 5, 0));
///
/// assert!(TimeDelay::empty() > delayed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeDelay {
    expected: Option<NaiveTime>,
    delay_ms: i64,
}

impl TimeDelay {
    /// Create a time/delay pair. `delay_ms` is in milliseconds.
    pub fn new(expected: Option<NaiveTime>, delay_ms: i64) -> Self {
        Self { expected, delay_ms }
    }

    /// An on-time value.
    pub fn of(expected: NaiveTime) -> Self {
        Self::new(Some(expected), 0)
    }

    /// A value with no known time.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn expected(&self) -> Option<NaiveTime> {
        self.expected
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    pub fn delay(&self) -> Duration {
        Duration::milliseconds(self.delay_ms)
    }

    /// Returns the expected time shifted by the delay.
    pub fn effective(&self) -> Option<NaiveTime> {
        self.expected
            .map(|t| t.overflowing_add_signed(self.delay()).0)
    }

    /// Returns true if this value sorts strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Greater
    }
}

impl Ord for TimeDelay {
    fn cmp(&self, other: &Self) -> Ordering {
        nulls_last(self.effective().as_ref(), other.effective().as_ref())
            .then_with(|| nulls_last(self.expected.as_ref(), other.expected.as_ref()))
            .then_with(|| self.delay_ms.cmp(&other.delay_ms))
    }
}

impl PartialOrd for TimeDelay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for TimeDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(t) => write!(
                f,
                "TimeDelay({:02}:{:02} +{}ms)",
                t.hour(),
                t.minute(),
                self.delay_ms
            ),
            None => write!(f, "TimeDelay(none +{}ms)", self.delay_ms),
        }
    }
}

impl fmt::Display for TimeDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(t) => write!(f, "{:02}:{:02}", t.hour(), t.minute())?,
            None => f.write_str("--:--")?,
        }
        if self.delay_ms != 0 {
            write!(f, " (+{}')", self.delay().num_minutes())?;
        }
        Ok(())
    }
}
