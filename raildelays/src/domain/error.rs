//! Domain error types.
//!
//! These errors represent validation failures in the domain layer. They
//! are distinct from fetch and output errors.

use super::{InvalidTrainLine, TimeError};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// A row is missing a field every written row must carry
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A scraped record pairs a different number of arrival and departure steps
    #[error("malformed record: {arrivals} arrival steps but {departures} departure steps")]
    MismatchedSteps { arrivals: usize, departures: usize },

    /// A scraped train id carries no route number
    #[error(transparent)]
    InvalidTrain(#[from] InvalidTrainLine),

    /// A scraped time is not in "HH:MM" format
    #[error(transparent)]
    InvalidTime(#[from] TimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::MissingField("expected train");
        assert_eq!(err.to_string(), "missing required field: expected train");

        let err = DomainError::MismatchedSteps {
            arrivals: 3,
            departures: 2,
        };
        assert_eq!(
            err.to_string(),
            "malformed record: 3 arrival steps but 2 departure steps"
        );

        let err: DomainError = crate::domain::TrainLine::parse("IC").unwrap_err().into();
        assert_eq!(err.to_string(), "invalid train id \"IC\": missing route number");

        let err: DomainError = crate::domain::parse_hhmm("8h00").unwrap_err().into();
        assert!(err.to_string().starts_with("invalid time"));
    }
}
