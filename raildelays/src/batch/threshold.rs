//! Flags rows whose delay reaches a threshold.

use tracing::{debug, info};

use crate::domain::ReportRow;

use super::state::{RunState, StateError};

/// Default threshold in minutes.
pub const DEFAULT_THRESHOLD: u64 = 60;

/// Records, per direction, the latest row delayed by at least the threshold.
///
/// Rows are always passed through; flagging only has a side effect on the
/// run state, read later by [`FlowDecider`](super::FlowDecider).
#[derive(Debug, Clone)]
pub struct ThresholdFlagger {
    threshold: u64,
    key: String,
}

impl ThresholdFlagger {
    /// `threshold` is in minutes; `key` is where flagged rows are stored.
    pub fn new(threshold: u64, key: impl Into<String>) -> Result<Self, StateError> {
        let key = key.into();
        if key.is_empty() {
            return Err(StateError::EmptyKey);
        }
        Ok(Self { threshold, key })
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn process(&self, row: ReportRow, state: &mut RunState) -> Result<ReportRow, StateError> {
        if row.delay_minutes < self.threshold {
            return Ok(row);
        }

        // Rows without a direction cannot be keyed.
        let Some(direction) = row.direction else {
            debug!(?row, "delayed row without direction");
            return Ok(row);
        };

        info!(%direction, delay = row.delay_minutes, train = ?row.expected_train1, "delay over threshold");
        state.flag(&self.key, direction, &row)?;
        Ok(row)
    }

    pub fn process_all(
        &self,
        rows: Vec<ReportRow>,
        state: &mut RunState,
    ) -> Result<Vec<ReportRow>, StateError> {
        rows.into_iter().map(|row| self.process(row, state)).collect()
    }
}
