//! Wire types for the realtime delay source.
//!
//! These types mirror the JSON returned by the source (or stored on disk
//! for offline runs). They are converted into domain types by the stop
//! reconciler; nothing here is validated beyond what serde enforces.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Language;

/// A request for one day of scraped data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    /// Date to scrape; a request without a date is a prototype
    pub date: Option<NaiveDate>,
    /// Language the source should report station names in
    pub language: Language,
}

impl ScrapeRequest {
    pub fn new(language: Language) -> Self {
        Self {
            date: None,
            language,
        }
    }
}

/// A request that can be re-targeted to another date.
pub trait DatedRequest: Clone {
    /// Returns a copy of this request for `date`.
    fn for_date(&self, date: NaiveDate) -> Self;
}

impl DatedRequest for ScrapeRequest {
    fn for_date(&self, date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..self.clone()
        }
    }
}

/// One train's run on a date, seen from both the arrival and departure boards.
///
/// Steps of the two directions are aligned by index: the i-th arrival step
/// and the i-th departure step describe the same station visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwoDirections {
    pub arrival: Option<DirectionRecord>,
    pub departure: Option<DirectionRecord>,
}

/// The steps of a train as seen from one board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionRecord {
    /// Source train identifier (e.g. "IC 466")
    #[serde(rename = "trainId")]
    pub train_id: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One station visit on one board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Station name, in the request's language
    pub station: String,
    /// Scheduled time in "HH:MM" format
    #[serde(default)]
    pub time: Option<String>,
    /// Delay in minutes
    #[serde(default)]
    pub delay: i64,
    #[serde(default)]
    pub canceled: bool,
}

impl Step {
    /// Delay in milliseconds.
    pub fn delay_ms(&self) -> i64 {
        self.delay.saturating_mul(60 * 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_date_keeps_language() {
        let prototype = ScrapeRequest::new(Language::Fr);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let request = prototype.for_date(date);
        assert_eq!(request.date, Some(date));
        assert_eq!(request.language, Language::Fr);
        assert_eq!(prototype.date, None);
    }

    #[test]
    fn deserialize_two_directions() {
        let json = r#"{
            "arrival": {
                "trainId": "IC 466",
                "steps": [
                    {"station": "Liège-Guillemins", "time": "08:00"},
                    {"station": "Brussels-Central", "time": "09:00", "delay": 5}
                ]
            },
            "departure": {
                "trainId": "IC 466",
                "steps": [
                    {"station": "Liège-Guillemins", "time": "08:01", "canceled": true},
                    {"station": "Brussels-Central"}
                ]
            }
        }"#;

        let record: TwoDirections = serde_json::from_str(json).unwrap();
        let arrival = record.arrival.unwrap();
        let departure = record.departure.unwrap();

        assert_eq!(arrival.train_id, "IC 466");
        assert_eq!(arrival.steps.len(), 2);
        assert_eq!(arrival.steps[1].delay, 5);
        assert_eq!(arrival.steps[1].delay_ms(), 300_000);
        assert!(departure.steps[0].canceled);
        assert_eq!(departure.steps[1].time, None);
    }

    #[test]
    fn missing_direction_is_none() {
        let record: TwoDirections = serde_json::from_str(r#"{"arrival": null}"#).unwrap();
        assert!(record.arrival.is_none());
        assert!(record.departure.is_none());
    }
}
