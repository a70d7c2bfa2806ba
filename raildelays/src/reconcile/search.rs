//! Fastest alternative train search.
//!
//! When a trip is late or canceled, the commuter may have taken another
//! train. The only delay known when deciding to switch is the one at the
//! departure station: nobody knows the effective arrival time in advance.
//! So a candidate is worth switching to when its scheduled arrival slips
//! less than the delay the expected train already had at departure.
//!
//! Candidates are arrivals at the trip's arrival station, expected at or
//! after the trip's expected arrival and sorted by increasing arrival
//! time. The first qualifying candidate wins; the order is what makes it
//! the earliest one.

use chrono::NaiveTime;
use tracing::{debug, info, trace};

use crate::domain::{LineStopChain, ReportRow, Station, StopRef, TimeDelay, delay_minutes};

/// Provides arrival candidates for the search.
pub trait ArrivalProvider {
    /// Stops at `station` expected at or after `after`, sorted by
    /// increasing expected arrival time.
    fn arrivals_after(&self, station: &Station, after: NaiveTime) -> Vec<StopRef<'_>>;
}

/// All reconciled chains of one date.
#[derive(Debug, Clone, Default)]
pub struct DayIndex {
    chains: Vec<LineStopChain>,
}

impl DayIndex {
    pub fn new(chains: Vec<LineStopChain>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &[LineStopChain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl ArrivalProvider for DayIndex {
    fn arrivals_after(&self, station: &Station, after: NaiveTime) -> Vec<StopRef<'_>> {
        let mut arrivals: Vec<(NaiveTime, StopRef<'_>)> = self
            .chains
            .iter()
            .filter_map(|chain| chain.find(station))
            .filter_map(|stop| {
                let expected = stop.stop().arrival.expected()?;
                (expected >= after).then_some((expected, stop))
            })
            .collect();

        arrivals.sort_by_key(|(expected, _)| *expected);
        arrivals.into_iter().map(|(_, stop)| stop).collect()
    }
}

/// Searches for a faster train actually run on the same date.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlternativeTrainFinder;

impl AlternativeTrainFinder {
    pub fn new() -> Self {
        Self
    }

    /// Return `item` with its effective side replaced by the first
    /// qualifying candidate, or `item` unchanged if none qualifies.
    ///
    /// `candidates` must be sorted by increasing arrival time.
    pub fn find_fastest(&self, item: &ReportRow, candidates: &[StopRef<'_>]) -> ReportRow {
        let Some(departure_station) = &item.departure_station else {
            return item.clone();
        };

        for candidate in candidates {
            if let Some(departure) = self.qualify(item, departure_station, *candidate) {
                return aggregate(item, departure, *candidate);
            }
        }

        trace!(?item, "no faster train");
        item.clone()
    }

    /// Query `provider` for candidates and search them.
    ///
    /// Candidates are the provider's arrivals after the item's expected
    /// arrival, minus the expected train itself: that train would always
    /// match first while saving no time.
    pub fn search<P: ArrivalProvider>(&self, item: &ReportRow, provider: &P) -> ReportRow {
        let (Some(station), Some(after)) = (&item.arrival_station, item.expected_arrival_time)
        else {
            return item.clone();
        };

        let candidates: Vec<StopRef<'_>> = provider
            .arrivals_after(station, after)
            .into_iter()
            .filter(|c| Some(c.stop().train) != item.expected_train1)
            .collect();
        trace!(count = candidates.len(), "candidate arrivals");

        self.find_fastest(item, &candidates)
    }

    /// Search for every item, preserving order.
    pub fn process_all<P: ArrivalProvider>(&self, items: &[ReportRow], provider: &P) -> Vec<ReportRow> {
        items.iter().map(|item| self.search(item, provider)).collect()
    }

    /// Returns the candidate's departure-side stop if the candidate is
    /// accepted.
    fn qualify<'a>(
        &self,
        item: &ReportRow,
        departure_station: &Station,
        candidate: StopRef<'a>,
    ) -> Option<StopRef<'a>> {
        let Some(departure) = candidate.find_previous(departure_station) else {
            trace!(candidate = ?candidate.stop(), "no departure-side stop");
            return None;
        };

        if departure.stop().canceled_departure {
            trace!(departure = ?departure.stop(), "canceled departure");
            return None;
        }

        if candidate.stop().canceled_arrival {
            trace!(candidate = ?candidate.stop(), "canceled arrival");
            return None;
        }

        if item.canceled {
            debug!(train = %candidate.stop().train, "faster than canceled train");
            return Some(departure);
        }

        let item_departure = TimeDelay::new(item.effective_departure_time, 0);
        if departure.stop().departure.is_after(&item_departure) {
            trace!(departure = ?departure.stop(), "leaves after the expected train");
            return None;
        }

        let slip = candidate
            .stop()
            .arrival
            .expected()
            .zip(item.expected_arrival_time)
            .map(|(candidate, expected)| candidate.signed_duration_since(expected));
        let delay_at_departure = item
            .effective_departure_time
            .zip(item.expected_departure_time)
            .map(|(effective, expected)| effective.signed_duration_since(expected));

        match (slip, delay_at_departure) {
            (Some(slip), Some(delay)) if slip < delay => {
                debug!(train = %candidate.stop().train, "faster than delayed train");
                Some(departure)
            }
            _ => None,
        }
    }
}

/// Keep `item`'s expected side and take the effective side from the
/// alternative leg.
fn aggregate(item: &ReportRow, departure: StopRef<'_>, arrival: StopRef<'_>) -> ReportRow {
    let effective_arrival_time = arrival.stop().arrival.effective();

    let row = ReportRow {
        date: item.date,
        direction: item.direction,
        departure_station: item.departure_station.clone(),
        arrival_station: item.arrival_station.clone(),
        link_station: item.link_station.clone(),
        expected_departure_time: item.expected_departure_time,
        expected_arrival_time: item.expected_arrival_time,
        expected_train1: item.expected_train1,
        expected_train2: item.expected_train2,
        effective_departure_time: departure.stop().departure.effective(),
        effective_arrival_time,
        effective_train1: Some(arrival.stop().train),
        effective_train2: None,
        delay_minutes: match (item.expected_arrival_time, effective_arrival_time) {
            (Some(expected), Some(effective)) => delay_minutes(expected, effective),
            _ => 0,
        },
        canceled: false,
        index: item.index,
    };

    info!(
        expected = ?item.expected_train1,
        effective = ?row.effective_train1,
        delay = row.delay_minutes,
        "fastest train"
    );
    row
}
