//! Report rows.
//!
//! A `ReportRow` is one directional leg of a commuter's round trip on a
//! given date: what was planned (expected side) and what actually ran
//! (effective side), plus the resulting delay.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::time::nulls_last;
use super::{DomainError, Station, TrainLine};

/// Leg of the round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Outbound, from station A to station B
    Departure,
    /// Return, from station B to station A
    Arrival,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Departure => f.write_str("DEPARTURE"),
            Direction::Arrival => f.write_str("ARRIVAL"),
        }
    }
}

/// One reconciled directional leg ready for reporting.
///
/// Equality and hashing only consider the planned trip: date, the three
/// stations and the two expected trains. Two rows describing the same
/// planned trip are the same row whatever actually happened, which is what
/// deduplication within a date relies on.
///
/// There is deliberately no `Ord` impl since the chronological order
/// (`natural_cmp`) does not agree with equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRow {
    pub date: Option<NaiveDate>,
    pub direction: Option<Direction>,
    pub departure_station: Option<Station>,
    pub arrival_station: Option<Station>,
    /// Station where the commuter changes trains, if any
    pub link_station: Option<Station>,
    pub expected_departure_time: Option<NaiveTime>,
    pub expected_arrival_time: Option<NaiveTime>,
    pub expected_train1: Option<TrainLine>,
    pub expected_train2: Option<TrainLine>,
    pub effective_departure_time: Option<NaiveTime>,
    pub effective_arrival_time: Option<NaiveTime>,
    pub effective_train1: Option<TrainLine>,
    pub effective_train2: Option<TrainLine>,
    /// Delay at arrival in whole minutes
    pub delay_minutes: u64,
    /// Whether the expected train was canceled on this leg
    #[serde(default)]
    pub canceled: bool,
    /// Explicit output slot, when the row must land at a fixed position
    #[serde(default)]
    pub index: Option<u64>,
}

impl ReportRow {
    /// The canonical empty row.
    pub const EMPTY: ReportRow = ReportRow {
        date: None,
        direction: None,
        departure_station: None,
        arrival_station: None,
        link_station: None,
        expected_departure_time: None,
        expected_arrival_time: None,
        expected_train1: None,
        expected_train2: None,
        effective_departure_time: None,
        effective_arrival_time: None,
        effective_train1: None,
        effective_train2: None,
        delay_minutes: 0,
        canceled: false,
        index: None,
    };

    /// Creates a row for a date and direction with every other field unset.
    pub fn new(date: NaiveDate, direction: Direction) -> Self {
        Self {
            date: Some(date),
            direction: Some(direction),
            ..Self::EMPTY
        }
    }

    /// Checks the fields every written row must carry.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("date", self.date.is_some()),
            ("direction", self.direction.is_some()),
            ("departure station", self.departure_station.is_some()),
            ("arrival station", self.arrival_station.is_some()),
            ("expected departure time", self.expected_departure_time.is_some()),
            ("expected arrival time", self.expected_arrival_time.is_some()),
            ("expected train", self.expected_train1.is_some()),
        ];

        match required.iter().find(|(_, present)| !present) {
            Some((field, _)) => Err(DomainError::MissingField(field)),
            None => Ok(()),
        }
    }

    /// Delay observed at departure, when both departure times are known.
    pub fn departure_delay(&self) -> Option<chrono::Duration> {
        match (self.effective_departure_time, self.expected_departure_time) {
            (Some(effective), Some(expected)) => Some(effective.signed_duration_since(expected)),
            _ => None,
        }
    }

    /// Chronological order: date, expected departure, expected arrival,
    /// each with missing values last.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        nulls_last(self.date.as_ref(), other.date.as_ref())
            .then_with(|| {
                nulls_last(
                    self.expected_departure_time.as_ref(),
                    other.expected_departure_time.as_ref(),
                )
            })
            .then_with(|| {
                nulls_last(
                    self.expected_arrival_time.as_ref(),
                    other.expected_arrival_time.as_ref(),
                )
            })
    }

    fn identity(
        &self,
    ) -> (
        Option<NaiveDate>,
        Option<&Station>,
        Option<&Station>,
        Option<&Station>,
        Option<TrainLine>,
        Option<TrainLine>,
    ) {
        (
            self.date,
            self.arrival_station.as_ref(),
            self.departure_station.as_ref(),
            self.link_station.as_ref(),
            self.expected_train1,
            self.expected_train2,
        )
    }
}

impl PartialEq for ReportRow {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ReportRow {}

impl Hash for ReportRow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
