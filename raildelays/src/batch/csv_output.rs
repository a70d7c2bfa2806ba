//! Paginated CSV output for report rows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Language, ReportRow, Station, TrainLine};

use super::writer::{ItemWriter, WriteError};

/// One CSV line. Every cell is text so the file reads the same in any
/// spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CsvRecord {
    row: u64,
    date: Option<String>,
    direction: Option<String>,
    departure_station: Option<String>,
    arrival_station: Option<String>,
    link_station: Option<String>,
    expected_departure: Option<String>,
    expected_arrival: Option<String>,
    expected_train1: Option<String>,
    expected_train2: Option<String>,
    effective_departure: Option<String>,
    effective_arrival: Option<String>,
    effective_train1: Option<String>,
    effective_train2: Option<String>,
    delay: u64,
    canceled: bool,
}

impl CsvRecord {
    fn new(position: u64, row: &ReportRow, language: Language) -> Self {
        let station = |s: &Option<Station>| {
            s.as_ref()
                .map(|s| s.name_in(language).unwrap_or(s.primary_name()).to_string())
        };
        let time = |t: Option<chrono::NaiveTime>| t.map(|t| t.format("%H:%M").to_string());
        let train = |t: Option<TrainLine>| t.map(|t| t.to_string());

        Self {
            row: position,
            date: row.date.map(|d| d.to_string()),
            direction: row.direction.map(|d| d.to_string()),
            departure_station: station(&row.departure_station),
            arrival_station: station(&row.arrival_station),
            link_station: station(&row.link_station),
            expected_departure: time(row.expected_departure_time),
            expected_arrival: time(row.expected_arrival_time),
            expected_train1: train(row.expected_train1),
            expected_train2: train(row.expected_train2),
            effective_departure: time(row.effective_departure_time),
            effective_arrival: time(row.effective_arrival_time),
            effective_train1: train(row.effective_train1),
            effective_train2: train(row.effective_train2),
            delay: row.delay_minutes,
            canceled: row.canceled,
        }
    }
}

/// Writes rows into numbered CSV files of at most `rows_per_file` rows.
///
/// Position `p` lands in file `p / rows_per_file`. The page being filled is
/// kept in memory and rewritten on every write, so a page already on disk
/// is extended rather than truncated when a run resumes into it.
#[derive(Debug)]
pub struct CsvPageWriter {
    dir: PathBuf,
    prefix: String,
    rows_per_file: u64,
    language: Language,
    page: Option<u64>,
    rows: BTreeMap<u64, CsvRecord>,
}

impl CsvPageWriter {
    /// `rows_per_file` is clamped to at least one.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, rows_per_file: u64) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            rows_per_file: rows_per_file.max(1),
            language: Language::default(),
            page: None,
            rows: BTreeMap::new(),
        }
    }

    /// Language station names are written in.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding page `page`.
    pub fn page_path(&self, page: u64) -> PathBuf {
        self.dir.join(format!("{}_{:03}.csv", self.prefix, page))
    }

    fn switch_to(&mut self, page: u64) -> Result<(), WriteError> {
        if self.page == Some(page) {
            return Ok(());
        }

        self.rows.clear();
        let path = self.page_path(page);
        if path.exists() {
            let csv_error = |source| WriteError::Csv {
                path: path.clone(),
                source,
            };
            let mut reader = ReaderBuilder::new().from_path(&path).map_err(csv_error)?;
            for record in reader.deserialize::<CsvRecord>() {
                let record = record.map_err(csv_error)?;
                self.rows.insert(record.row, record);
            }
            debug!(path = %path.display(), rows = self.rows.len(), "resumed page");
        }

        self.page = Some(page);
        Ok(())
    }

    /// Page numbers of this writer's files present in `dir`.
    fn pages_on_disk(&self) -> Result<Vec<u64>, WriteError> {
        let io_error = |source| WriteError::Io {
            path: self.dir.clone(),
            source,
        };
        let prefix = format!("{}_", self.prefix);

        let mut pages = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_error)? {
            let name = entry.map_err(io_error)?.file_name();
            if let Some(page) = name
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(".csv"))
                .and_then(|number| number.parse::<u64>().ok())
            {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    fn remove_page(&self, page: u64) -> Result<(), WriteError> {
        let path = self.page_path(page);
        std::fs::remove_file(&path).map_err(|source| WriteError::Io { path, source })
    }

    fn flush(&self, page: u64) -> Result<(), WriteError> {
        let path = self.page_path(page);
        let csv_error = |source| WriteError::Csv {
            path: path.clone(),
            source,
        };

        let mut writer = WriterBuilder::new().from_path(&path).map_err(csv_error)?;
        for record in self.rows.values() {
            writer.serialize(record).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| WriteError::Io {
            path: path.clone(),
            source,
        })
    }
}

impl ItemWriter for CsvPageWriter {
    type Item = ReportRow;

    fn do_open(&mut self) -> Result<(), WriteError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| WriteError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    fn do_write(&mut self, position: u64, item: &ReportRow) -> Result<bool, WriteError> {
        let page = position / self.rows_per_file;
        self.switch_to(page)?;

        let filled = self
            .rows
            .insert(position, CsvRecord::new(position, item, self.language))
            .is_none();
        self.flush(page)?;
        Ok(filled)
    }

    fn truncate_from(&mut self, position: u64) -> Result<(), WriteError> {
        let first = position / self.rows_per_file;

        // Reload from disk: the buffer may predate a failed flush.
        self.page = None;
        self.switch_to(first)?;
        let before = self.rows.len();
        self.rows.retain(|row, _| *row < position);
        if self.rows.len() < before {
            if self.rows.is_empty() {
                self.remove_page(first)?;
            } else {
                self.flush(first)?;
            }
        }

        let mut removed = before - self.rows.len();
        for page in self.pages_on_disk()? {
            if page > first {
                self.remove_page(page)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(position, removed, "discarded rows past checkpoint");
        }
        Ok(())
    }

    fn do_close(&mut self) -> Result<(), WriteError> {
        self.page = None;
        self.rows.clear();
        Ok(())
    }
}
