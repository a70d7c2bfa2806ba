//! Run state persisted between run attempts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{Direction, ReportRow};

/// Key of the last date whose rows were fully written.
pub const LAST_DATE_KEY: &str = "pipeline.last.date";

/// Errors reading or writing run state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state key must not be empty")]
    EmptyKey,

    #[error("state entry {key} is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Flat key/value map surviving a restart.
///
/// Values are JSON so the file stays readable; typed accessors report a
/// malformed entry instead of silently ignoring it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunState {
    entries: Map<String, Value>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deserialize the entry under `key`, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        self.entries
            .get(key)
            .map(|value| {
                T::deserialize(value).map_err(|source| StateError::Malformed {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StateError> {
        let value = serde_json::to_value(value).map_err(|source| StateError::Malformed {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, StateError> {
        self.get(key)
    }

    pub fn put_u64(&mut self, key: &str, value: u64) {
        self.entries.insert(key.to_string(), Value::from(value));
    }

    /// The last date whose rows were fully written, if any.
    pub fn last_date(&self) -> Result<Option<NaiveDate>, StateError> {
        self.get(LAST_DATE_KEY)
    }

    pub fn set_last_date(&mut self, date: NaiveDate) {
        self.entries
            .insert(LAST_DATE_KEY.to_string(), Value::from(date.to_string()));
    }

    /// Rows flagged under `key`, by direction.
    pub fn flagged(&self, key: &str) -> Result<BTreeMap<Direction, ReportRow>, StateError> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    /// Record `row` under `key` for `direction`, replacing the previous one.
    pub fn flag(&mut self, key: &str, direction: Direction, row: &ReportRow) -> Result<(), StateError> {
        let mut flagged = self.flagged(key)?;
        flagged.insert(direction, row.clone());
        self.put(key, &flagged)
    }
}

/// JSON file holding a [`RunState`].
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. A missing file is a fresh run.
    pub fn load(&self) -> Result<RunState, StateError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no run state, starting fresh");
                return Ok(RunState::new());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist `state`, creating parent directories if needed.
    ///
    /// The file is written beside the target and renamed over it, so a
    /// crash mid-write leaves the previous checkpoint intact.
    pub fn save(&self, state: &RunState) -> Result<(), StateError> {
        let io_error = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_error)?;
        std::fs::rename(&tmp, &self.path).map_err(io_error)?;

        debug!(path = %self.path.display(), entries = state.len(), "saved run state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Station;
    use tempfile::tempdir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn row(delay: u64) -> ReportRow {
        ReportRow {
            departure_station: Some(Station::new("Liège-Guillemins")),
            arrival_station: Some(Station::new("Brussels-Central")),
            delay_minutes: delay,
            ..ReportRow::new(date(15), Direction::Departure)
        }
    }

    #[test]
    fn counters_round_trip() {
        let mut state = RunState::new();
        assert_eq!(state.get_u64("writer.write.count").unwrap(), None);

        state.put_u64("writer.write.count", 5);
        assert_eq!(state.get_u64("writer.write.count").unwrap(), Some(5));
    }

    #[test]
    fn malformed_entry_reported() {
        let mut state = RunState::new();
        state.put("writer.write.count", &"five").unwrap();

        let err = state.get_u64("writer.write.count").unwrap_err();
        assert!(matches!(err, StateError::Malformed { key, .. } if key == "writer.write.count"));
    }

    #[test]
    fn flags_keyed_by_direction() {
        let mut state = RunState::new();
        state.flag("delays", Direction::Departure, &row(61)).unwrap();
        state.flag("delays", Direction::Arrival, &row(75)).unwrap();
        state.flag("delays", Direction::Departure, &row(90)).unwrap();

        let flagged = state.flagged("delays").unwrap();
        assert_eq!(flagged.len(), 2);
        assert_eq!(flagged[&Direction::Departure].delay_minutes, 90);
        assert_eq!(flagged[&Direction::Arrival].delay_minutes, 75);
    }

    #[test]
    fn save_and_load_state() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("state.json"));

        let mut state = RunState::new();
        state.put_u64("writer.write.count", 12);
        state.set_last_date(date(14));
        state.flag("delays", Direction::Arrival, &row(61)).unwrap();
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.last_date().unwrap(), Some(date(14)));
        assert_eq!(
            loaded.flagged("delays").unwrap()[&Direction::Arrival].arrival_station,
            Some(Station::new("Brussels-Central"))
        );
    }

    #[test]
    fn missing_file_is_fresh_state() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = RunStateStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        RunStateStore::new(&path).save(&RunState::new()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn error_display() {
        assert_eq!(StateError::EmptyKey.to_string(), "state key must not be empty");
    }
}
