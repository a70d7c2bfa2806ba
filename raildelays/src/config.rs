//! Report configuration.
//!
//! Loaded from a JSON file; every field has a default so a file only needs
//! to name what differs. Command-line flags override paths and dates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::batch::DEFAULT_THRESHOLD;
use crate::domain::{Language, Station};
use crate::fetch::{BackoffPolicy, RateLimit, RetryPolicy};

/// Errors loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config field {0} must not be empty")]
    Empty(&'static str),

    #[error("config field {field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Shape of the wait between fetch attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    #[default]
    Exponential,
}

/// Where scraped records come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// The live source over HTTP.
    Http {
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// One `YYYY-MM-DD.json` file per date.
    Directory { path: PathBuf },
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Directory {
            path: PathBuf::from("data"),
        }
    }
}

/// Everything a report run needs to know.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Home station of the commute, in `language`
    pub station_a: String,
    /// Work station of the commute, in `language`
    pub station_b: String,
    /// Language of scraped and reported station names
    pub language: Language,

    /// Delay in minutes from which a row is flagged
    pub threshold_minutes: u64,
    /// Run state key holding flagged rows
    pub flag_key: String,

    /// Bounds of the random pause before each fetch (milliseconds)
    pub min_pause_ms: u64,
    pub max_pause_ms: u64,
    /// Total fetch attempts per date
    pub max_attempts: u32,
    pub retry_parse_errors: bool,
    pub backoff: BackoffKind,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,

    pub source: SourceConfig,

    /// Rows per output file
    pub rows_per_file: u64,
    /// Stop writing after this many rows
    pub max_rows: Option<u64>,
    pub output_dir: PathBuf,
    pub output_prefix: String,
    /// Namespace of the writer's keys in the run state
    pub writer_name: String,

    pub state_path: PathBuf,
    pub schedule_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            station_a: String::new(),
            station_b: String::new(),
            language: Language::default(),
            threshold_minutes: DEFAULT_THRESHOLD,
            flag_key: "delay.threshold.rows".to_string(),
            min_pause_ms: 1_000,
            max_pause_ms: 5_000,
            max_attempts: 3,
            retry_parse_errors: false,
            backoff: BackoffKind::default(),
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
            source: SourceConfig::default(),
            rows_per_file: 40,
            max_rows: None,
            output_dir: PathBuf::from("output"),
            output_prefix: "delays".to_string(),
            writer_name: "report".to_string(),
            state_path: PathBuf::from("state/run_state.json"),
            schedule_path: PathBuf::from("state/schedules.json"),
        }
    }
}

impl ReportConfig {
    /// A configuration for the commute between `station_a` and `station_b`.
    pub fn new(station_a: impl Into<String>, station_b: impl Into<String>) -> Self {
        Self {
            station_a: station_a.into(),
            station_b: station_b.into(),
            ..Self::default()
        }
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_threshold(mut self, minutes: u64) -> Self {
        self.threshold_minutes = minutes;
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn with_schedule_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schedule_path = path.into();
        self
    }

    pub fn with_rows_per_file(mut self, rows: u64) -> Self {
        self.rows_per_file = rows;
        self
    }

    /// Check everything that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.station_a.trim().is_empty() {
            return Err(ConfigError::Empty("station_a"));
        }
        if self.station_b.trim().is_empty() {
            return Err(ConfigError::Empty("station_b"));
        }
        if self.flag_key.is_empty() {
            return Err(ConfigError::Empty("flag_key"));
        }
        if self.writer_name.is_empty() {
            return Err(ConfigError::Empty("writer_name"));
        }
        if self.rows_per_file == 0 {
            return Err(ConfigError::Invalid {
                field: "rows_per_file",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_pause_ms > self.max_pause_ms {
            return Err(ConfigError::Invalid {
                field: "min_pause_ms",
                reason: format!("{} exceeds max_pause_ms {}", self.min_pause_ms, self.max_pause_ms),
            });
        }
        if let SourceConfig::Http { base_url, .. } = &self.source
            && base_url.trim().is_empty()
        {
            return Err(ConfigError::Empty("source.base_url"));
        }
        Ok(())
    }

    /// Station A as named in the configured language.
    pub fn station_a(&self) -> Station {
        Station::named(self.station_a.trim(), self.language)
    }

    pub fn station_b(&self) -> Station {
        Station::named(self.station_b.trim(), self.language)
    }

    pub fn rate_limit(&self) -> RateLimit {
        RateLimit::new(
            Duration::from_millis(self.min_pause_ms),
            Duration::from_millis(self.max_pause_ms),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_retry_parse_errors(self.retry_parse_errors)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        let initial = Duration::from_millis(self.backoff_initial_ms);
        match self.backoff {
            BackoffKind::Fixed => BackoffPolicy::Fixed { delay: initial },
            BackoffKind::Exponential => BackoffPolicy::Exponential {
                initial,
                max: Duration::from_millis(self.backoff_max_ms),
            },
        }
    }
}
