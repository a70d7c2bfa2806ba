//! Train line (route number) type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a source train id does not carry a route number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid train id {id:?}: {reason}")]
pub struct InvalidTrainLine {
    id: String,
    reason: &'static str,
}

/// A train line identified by its route number.
///
/// The scraped source identifies trains by a short string id such as
/// `"466"` or `"IC 466"`. Only the route number matters for identity.
///
/// # Examples
///
/// ```
/// use raildelays::domain::TrainLine;
///
/// let line = TrainLine::parse("466").unwrap();
/// assert_eq!(line.route_id(), 466);
/// assert_eq!(TrainLine::parse("IC 466").unwrap(), line);
///
/// assert!(TrainLine::parse("").is_err());
/// assert!(TrainLine::parse("IC").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainLine(u64);

impl TrainLine {
    /// Create a train line from a route number.
    pub fn new(route_id: u64) -> Self {
        TrainLine(route_id)
    }

    /// Parse a source train id.
    ///
    /// An optional alphabetic category prefix (`"IC"`, `"P"`, ...) and
    /// whitespace are skipped; the remainder must be a decimal number.
    pub fn parse(id: &str) -> Result<Self, InvalidTrainLine> {
        let digits = id
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim();

        if digits.is_empty() {
            return Err(InvalidTrainLine {
                id: id.to_string(),
                reason: "missing route number",
            });
        }

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidTrainLine {
                id: id.to_string(),
                reason: "route number must be decimal digits",
            });
        }

        digits
            .parse::<u64>()
            .map(TrainLine)
            .map_err(|_| InvalidTrainLine {
                id: id.to_string(),
                reason: "route number out of range",
            })
    }

    pub fn route_id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TrainLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrainLine({})", self.0)
    }
}

impl fmt::Display for TrainLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
