//! Reconciliation of scraped records into report rows.
//!
//! Records are linked into stop chains against reference data, holes in
//! the schedule are backfilled from canonical timetables, each chain is
//! mapped onto the commuter's leg, and late or canceled legs are matched
//! against faster trains that ran the same day.

mod backfill;
mod mapper;
mod row_mapper;
mod search;


pub use backfill::{CanonicalSchedule, InMemoryScheduleStore, ScheduleBackfiller, ScheduleStore};
pub use mapper::{InMemoryReferenceStore, ReferenceStore, StopReconciler};
pub use row_mapper::{Leg, RowMapper, map_leg};
pub use search::{AlternativeTrainFinder, ArrivalProvider, DayIndex};
