//! Realtime delay source client.
//!
//! The source publishes, for each date, every train that ran with its
//! stops as seen from the arrival and departure boards. Fetching is split
//! into a `Transport` that yields the raw body and a `StreamParser` that
//! turns it into records, so either half can be swapped independently.
//!
//! Key characteristics of the source:
//! - Times are in "HH:MM" format, local time of the date requested
//! - Delays are whole minutes
//! - Station names come back in the language asked for

mod error;
mod parser;
mod transport;
mod types;

pub use error::ScrapeError;
pub use parser::{JsonParser, StreamParser};
pub use transport::{DirectoryTransport, HttpConfig, HttpTransport, Transport};
pub use types::{DatedRequest, DirectionRecord, ScrapeRequest, Step, TwoDirections};
