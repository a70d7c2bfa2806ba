//! Date-driven composition of a date source with the fetcher.

use std::collections::VecDeque;

use chrono::NaiveDate;
use tracing::debug;

use crate::scraper::{DatedRequest, StreamParser, Transport};

use super::error::FetchError;
use super::fetcher::RateLimitedFetcher;

/// An ordered, exhaustible source of dates.
///
/// Never yields the same date twice within one run.
pub trait DateSource {
    fn next_date(&mut self) -> Option<NaiveDate>;
}

/// Dates from an explicit list, in list order.
#[derive(Debug, Clone, Default)]
pub struct VecDateSource {
    dates: VecDeque<NaiveDate>,
}

impl VecDateSource {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }
}

impl DateSource for VecDateSource {
    fn next_date(&mut self) -> Option<NaiveDate> {
        self.dates.pop_front()
    }
}

/// Every date from `start` to `end` inclusive.
///
/// # Examples
///
/// ```
/// use raildelays::fetch::{DateRange, DateSource};
/// use chrono::NaiveDate;
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
/// let mut range = DateRange::new(d(1), d(5)).resume_after(Some(d(3)));
///
/// assert_eq!(range.next_date(), Some(d(4)));
/// assert_eq!(range.next_date(), Some(d(5)));
/// assert_eq!(range.next_date(), None);
/// ```
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            next: (start <= end).then_some(start),
            end,
        }
    }

    /// Skip every date up to and including `last_completed`.
    pub fn resume_after(mut self, last_completed: Option<NaiveDate>) -> Self {
        if let (Some(next), Some(last)) = (self.next, last_completed)
            && next <= last
        {
            self.next = last.succ_opt().filter(|d| *d <= self.end);
        }
        self
    }
}

impl DateSource for DateRange {
    fn next_date(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.end);
        Some(current)
    }
}

/// Everything scraped for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedBatch<I> {
    pub date: NaiveDate,
    pub items: Vec<I>,
}

/// Fetches one batch per date from a date source.
///
/// `read` returns `Ok(None)` only once the date source is exhausted. A date
/// whose fetch produced nothing still yields a batch, with no items: no
/// data for a date means no delays recorded, not end of work.
pub struct DateDrivenComposer<S, T: Transport, P> {
    dates: S,
    fetcher: RateLimitedFetcher<T, P>,
}

impl<S, T, P, I> DateDrivenComposer<S, T, P>
where
    S: DateSource,
    T: Transport,
    T::Request: DatedRequest + std::fmt::Debug,
    P: StreamParser<Output = Vec<I>>,
{
    pub fn new(dates: S, fetcher: RateLimitedFetcher<T, P>) -> Self {
        Self { dates, fetcher }
    }

    /// Fetch the next date's batch.
    pub async fn read(&mut self) -> Result<Option<DatedBatch<I>>, FetchError> {
        let Some(date) = self.dates.next_date() else {
            debug!("date source exhausted");
            return Ok(None);
        };

        let request = self.fetcher.prototype().for_date(date);
        self.fetcher.set_request(request);

        let items = self.fetcher.read().await?.unwrap_or_default();
        debug!(%date, count = items.len(), "fetched batch");

        Ok(Some(DatedBatch { date, items }))
    }
}
