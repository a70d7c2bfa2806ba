//! Branches the run outcome on flagged delays.

use std::fmt;

use tracing::info;

use super::state::{RunState, StateError};

/// Outcome of a finished step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Failed,
    Stopped,
}

/// Outcome of the whole run, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Completed,
    /// Completed, and at least one row was delayed beyond the threshold.
    CompletedWithNotableDelay,
    Failed,
    Stopped,
}

impl From<StepStatus> for FlowStatus {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Completed => FlowStatus::Completed,
            StepStatus::Failed => FlowStatus::Failed,
            StepStatus::Stopped => FlowStatus::Stopped,
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStatus::Completed => "COMPLETED",
            FlowStatus::CompletedWithNotableDelay => "COMPLETED_WITH_NOTABLE_DELAY",
            FlowStatus::Failed => "FAILED",
            FlowStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Decides the flow status once a step has finished.
#[derive(Debug, Clone)]
pub struct FlowDecider {
    key: String,
}

impl FlowDecider {
    /// `key` must match the key the flagger stores rows under.
    pub fn new(key: impl Into<String>) -> Result<Self, StateError> {
        let key = key.into();
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }
        Ok(Self { key })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Without a step there is nothing to branch on, so the run completed.
    pub fn decide(&self, step: Option<StepStatus>, state: &RunState) -> FlowStatus {
        let Some(step) = step else {
            return FlowStatus::Completed;
        };

        let status = FlowStatus::from(step);
        if status == FlowStatus::Completed && state.contains_key(&self.key) {
            info!(key = %self.key, "notable delay recorded");
            return FlowStatus::CompletedWithNotableDelay;
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ThresholdFlagger;
    use crate::domain::{Direction, ReportRow};
    use chrono::NaiveDate;

    fn flagged_state() -> RunState {
        let row = ReportRow {
            delay_minutes: 61,
            ..ReportRow::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), Direction::Departure)
        };
        let mut state = RunState::new();
        ThresholdFlagger::new(60, "delays")
            .unwrap()
            .process(row, &mut state)
            .unwrap();
        state
    }

    #[test]
    fn no_step_is_completed() {
        let decider = FlowDecider::new("delays").unwrap();
        assert_eq!(decider.decide(None, &flagged_state()), FlowStatus::Completed);
    }

    #[test]
    fn completed_without_flag() {
        let decider = FlowDecider::new("delays").unwrap();
        assert_eq!(
            decider.decide(Some(StepStatus::Completed), &RunState::new()),
            FlowStatus::Completed
        );
    }

    #[test]
    fn completed_with_flag() {
        let decider = FlowDecider::new("delays").unwrap();
        assert_eq!(
            decider.decide(Some(StepStatus::Completed), &flagged_state()),
            FlowStatus::CompletedWithNotableDelay
        );
    }

    #[test]
    fn failure_wins_over_flag() {
        let decider = FlowDecider::new("delays").unwrap();
        assert_eq!(
            decider.decide(Some(StepStatus::Failed), &flagged_state()),
            FlowStatus::Failed
        );
        assert_eq!(
            decider.decide(Some(StepStatus::Stopped), &flagged_state()),
            FlowStatus::Stopped
        );
    }

    #[test]
    fn other_key_ignored() {
        let decider = FlowDecider::new("other").unwrap();
        assert_eq!(
            decider.decide(Some(StepStatus::Completed), &flagged_state()),
            FlowStatus::Completed
        );
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(FlowDecider::new(""), Err(StateError::EmptyKey)));
    }

    #[test]
    fn status_display() {
        assert_eq!(FlowStatus::CompletedWithNotableDelay.to_string(), "COMPLETED_WITH_NOTABLE_DELAY");
        assert_eq!(FlowStatus::Completed.to_string(), "COMPLETED");
    }
}
