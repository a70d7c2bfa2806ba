//! Domain types for the delay report.
//!
//! This module contains the core value types: stations, train lines,
//! time/delay pairs, linked stop chains and report rows. Types enforce
//! their invariants at construction time, so code that receives them can
//! trust their validity.

mod error;
mod line_stop;
mod report_row;
mod station;
mod time;
mod train_line;

pub use error::DomainError;
pub use line_stop::{ChainBuilder, LineStop, LineStopChain, StopIndex, StopRef};
pub use report_row::{Direction, ReportRow};
pub use station::{InvalidLanguage, Language, Station, normalize_name};
pub use time::{TimeDelay, TimeError, delay_minutes, nulls_last, parse_hhmm};
pub use train_line::{InvalidTrainLine, TrainLine};
