//! Stop chains to directional report rows.

use tracing::trace;

use crate::domain::{Direction, LineStopChain, ReportRow, Station, StopRef, delay_minutes};

/// Where a train picks up and drops off the commuter.
#[derive(Debug, Clone, Copy)]
pub struct Leg<'a> {
    pub direction: Direction,
    pub departure: StopRef<'a>,
    pub arrival: StopRef<'a>,
}

/// Maps chains onto rows for the commute between station A and station B.
///
/// A train calling at A before B is the outbound (`Departure`) leg; one
/// calling at B before A is the return (`Arrival`) leg.
#[derive(Debug, Clone)]
pub struct RowMapper {
    station_a: Station,
    station_b: Station,
}

impl RowMapper {
    pub fn new(station_a: Station, station_b: Station) -> Self {
        Self {
            station_a,
            station_b,
        }
    }

    pub fn station_a(&self) -> &Station {
        &self.station_a
    }

    pub fn station_b(&self) -> &Station {
        &self.station_b
    }

    /// Locate the leg of `chain` between the two stations, if it calls at both.
    pub fn leg<'a>(&self, chain: &'a LineStopChain) -> Option<Leg<'a>> {
        let a = chain.find(&self.station_a)?;
        let b = chain.find(&self.station_b)?;

        let leg = if a.index() < b.index() {
            Leg {
                direction: Direction::Departure,
                departure: a,
                arrival: b,
            }
        } else if b.index() < a.index() {
            Leg {
                direction: Direction::Arrival,
                departure: b,
                arrival: a,
            }
        } else {
            return None;
        };
        Some(leg)
    }

    /// Map the leg of `chain` between the two stations onto a row.
    pub fn map(&self, chain: &LineStopChain) -> Option<ReportRow> {
        let leg = self.leg(chain)?;
        let row = map_leg(&leg);
        trace!(?row, "mapped row");
        Some(row)
    }
}

/// Build a row from a located leg. The same train is both expected and
/// effective.
pub fn map_leg(leg: &Leg<'_>) -> ReportRow {
    let departure = leg.departure.stop();
    let arrival = leg.arrival.stop();

    let expected_arrival_time = arrival.arrival.expected();
    let effective_arrival_time = arrival.arrival.effective();

    ReportRow {
        departure_station: Some(departure.station.clone()),
        arrival_station: Some(arrival.station.clone()),
        expected_departure_time: departure.departure.expected(),
        expected_arrival_time,
        expected_train1: Some(departure.train),
        effective_departure_time: departure.departure.effective(),
        effective_arrival_time,
        effective_train1: Some(arrival.train),
        delay_minutes: match (expected_arrival_time, effective_arrival_time) {
            (Some(expected), Some(effective)) => delay_minutes(expected, effective),
            _ => 0,
        },
        canceled: departure.canceled_departure || arrival.canceled_arrival,
        ..ReportRow::new(departure.date, leg.direction)
    }
}
