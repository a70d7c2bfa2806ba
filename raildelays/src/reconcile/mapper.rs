//! Two-direction scrape records to linked stop chains.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, trace, warn};

use crate::domain::{
    ChainBuilder, DomainError, Language, LineStop, LineStopChain, Station, TimeDelay, TrainLine,
    normalize_name, parse_hhmm,
};
use crate::scraper::{Step, TwoDirections};

/// Known stations and trains, looked up by natural key.
///
/// Lookups never create anything; `StopReconciler` decides when an
/// observed value becomes canonical and calls `remember_*`.
pub trait ReferenceStore {
    /// Find a station by its name in `language`, ignoring accents and case.
    fn find_station(&self, name: &str, language: Language) -> Option<Station>;

    fn find_train(&self, route_id: u64) -> Option<TrainLine>;

    fn remember_station(&mut self, station: Station);

    fn remember_train(&mut self, train: TrainLine);
}

/// Reference data held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceStore {
    stations: Vec<Station>,
    /// (language, normalized name) -> index into `stations`
    by_name: HashMap<(Language, String), usize>,
    trains: HashMap<u64, TrainLine>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store already knowing `stations`.
    pub fn with_stations(stations: impl IntoIterator<Item = Station>) -> Self {
        let mut store = Self::new();
        for station in stations {
            store.remember_station(station);
        }
        store
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn train_count(&self) -> usize {
        self.trains.len()
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn find_station(&self, name: &str, language: Language) -> Option<Station> {
        self.by_name
            .get(&(language, normalize_name(name)))
            .map(|&idx| self.stations[idx].clone())
    }

    fn find_train(&self, route_id: u64) -> Option<TrainLine> {
        self.trains.get(&route_id).copied()
    }

    fn remember_station(&mut self, station: Station) {
        let idx = self.stations.len();
        let mut added = false;

        for language in [Language::En, Language::Fr, Language::Nl] {
            if let Some(name) = station.name_in(language) {
                self.by_name
                    .entry((language, normalize_name(name)))
                    .or_insert_with(|| {
                        added = true;
                        idx
                    });
            }
        }

        if added {
            self.stations.push(station);
        }
    }

    fn remember_train(&mut self, train: TrainLine) {
        self.trains.entry(train.route_id()).or_insert(train);
    }
}

/// Maps scrape records onto stop chains, merging reference data.
///
/// Stations and trains are resolved against the reference store; an
/// unknown value becomes canonical on first sight, so every later record
/// in the same run resolves to the same instance.
#[derive(Debug)]
pub struct StopReconciler<R> {
    store: R,
    language: Language,
}

impl<R: ReferenceStore> StopReconciler<R> {
    /// `language` is the language the scraped station names are in.
    pub fn new(store: R, language: Language) -> Self {
        Self { store, language }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn into_store(self) -> R {
        self.store
    }

    /// Map one record into a chain.
    ///
    /// Returns `Ok(None)` when either direction is absent or has no steps.
    /// The i-th arrival step and i-th departure step become the i-th stop;
    /// surplus departure steps are ignored.
    pub fn map(
        &mut self,
        date: NaiveDate,
        record: &TwoDirections,
    ) -> Result<Option<LineStopChain>, DomainError> {
        let (Some(arrival), Some(departure)) = (&record.arrival, &record.departure) else {
            trace!(%date, "record lacks a direction");
            return Ok(None);
        };

        if arrival.steps.len() > departure.steps.len() {
            return Err(DomainError::MismatchedSteps {
                arrivals: arrival.steps.len(),
                departures: departure.steps.len(),
            });
        }

        let train = self.merge_train(TrainLine::parse(&arrival.train_id)?);

        let mut builder: Option<ChainBuilder> = None;
        for (arrival_step, departure_step) in arrival.steps.iter().zip(&departure.steps) {
            let stop = self.map_stop(date, train, arrival_step, departure_step)?;
            match builder.as_mut() {
                Some(b) => {
                    b.add_next(stop);
                }
                None => builder = Some(ChainBuilder::new(stop)),
            }
        }

        let chain = builder.map(ChainBuilder::build);
        if let Some(chain) = &chain {
            debug!(%date, %train, stops = chain.len(), "mapped record");
        }
        Ok(chain)
    }

    /// Map every record, dropping malformed ones with a warning.
    pub fn map_all(&mut self, date: NaiveDate, records: &[TwoDirections]) -> Vec<LineStopChain> {
        records
            .iter()
            .filter_map(|record| match self.map(date, record) {
                Ok(chain) => chain,
                Err(e) => {
                    warn!(%date, error = %e, "skipping malformed record");
                    None
                }
            })
            .collect()
    }

    fn map_stop(
        &mut self,
        date: NaiveDate,
        train: TrainLine,
        arrival: &Step,
        departure: &Step,
    ) -> Result<LineStop, DomainError> {
        let station = self.merge_station(Station::named(arrival.station.trim(), self.language));

        Ok(LineStop::new(date, station, train)
            .with_arrival(time_delay(arrival)?)
            .with_departure(time_delay(departure)?)
            .with_canceled(arrival.canceled, departure.canceled))
    }

    fn merge_train(&mut self, observed: TrainLine) -> TrainLine {
        if let Some(known) = self.store.find_train(observed.route_id()) {
            return known;
        }
        debug!(train = %observed, "create train");
        self.store.remember_train(observed);
        observed
    }

    /// The canonical station for `observed`, remembering it if unknown.
    pub fn merge_station(&mut self, observed: Station) -> Station {
        let known = [Language::En, Language::Fr, Language::Nl]
            .into_iter()
            .find_map(|language| observed.name_in(language).map(|name| (language, name)))
            .and_then(|(language, name)| self.store.find_station(name, language));

        if let Some(known) = known {
            return known;
        }
        debug!(station = %observed, "create station");
        self.store.remember_station(observed.clone());
        observed
    }
}

fn time_delay(step: &Step) -> Result<TimeDelay, DomainError> {
    let expected = step.time.as_deref().map(parse_hhmm).transpose()?;
    Ok(TimeDelay::new(expected, step.delay_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::DirectionRecord;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn step(station: &str, time: Option<&str>, delay: i64, canceled: bool) -> Step {
        Step {
            station: station.to_string(),
            time: time.map(str::to_string),
            delay,
            canceled,
        }
    }

    fn direction(train: &str, steps: Vec<Step>) -> Option<DirectionRecord> {
        Some(DirectionRecord {
            train_id: train.to_string(),
            steps,
        })
    }

    fn record() -> TwoDirections {
        TwoDirections {
            arrival: direction(
                "IC 466",
                vec![
                    step("Liège-Guillemins", None, 0, false),
                    step("Namur", Some("08:40"), 2, false),
                    step("Brussels-Central", Some("09:20"), 5, false),
                ],
            ),
            departure: direction(
                "IC 466",
                vec![
                    step("Liège-Guillemins", Some("08:00"), 1, false),
                    step("Namur", Some("08:42"), 3, true),
                    step("Brussels-Central", None, 0, false),
                ],
            ),
        }
    }

    fn reconciler() -> StopReconciler<InMemoryReferenceStore> {
        StopReconciler::new(InMemoryReferenceStore::new(), Language::En)
    }

    #[test]
    fn pairs_steps_by_index() {
        let chain = reconciler().map(date(), &record()).unwrap().unwrap();
        assert_eq!(chain.len(), 3);

        let namur = chain.find(&Station::new("Namur")).unwrap();
        let stop = namur.stop();
        assert_eq!(stop.train, TrainLine::new(466));
        assert_eq!(stop.arrival.expected(), Some(parse_hhmm("08:40").unwrap()));
        assert_eq!(stop.arrival.delay_ms(), 2 * 60 * 1000);
        assert_eq!(stop.departure.expected(), Some(parse_hhmm("08:42").unwrap()));
        assert!(!stop.canceled_arrival);
        assert!(stop.canceled_departure);
    }

    #[test]
    fn links_front_to_back() {
        let chain = reconciler().map(date(), &record()).unwrap().unwrap();
        let names: Vec<String> = chain
            .head()
            .unwrap()
            .descendants()
            .map(|s| s.stop().station.english_name().to_string())
            .collect();
        assert_eq!(names, vec!["Namur", "Brussels-Central"]);
        assert!(chain.head().unwrap().previous().is_none());
    }

    #[test]
    fn missing_direction_yields_nothing() {
        let mut record = record();
        record.departure = None;
        assert!(reconciler().map(date(), &record).unwrap().is_none());

        let mut record = self::record();
        record.arrival = None;
        assert!(reconciler().map(date(), &record).unwrap().is_none());
    }

    #[test]
    fn no_steps_yields_nothing() {
        let record = TwoDirections {
            arrival: direction("466", vec![]),
            departure: direction("466", vec![]),
        };
        assert!(reconciler().map(date(), &record).unwrap().is_none());
    }

    #[test]
    fn surplus_arrival_steps_rejected() {
        let mut record = record();
        if let Some(departure) = record.departure.as_mut() {
            departure.steps.pop();
        }

        let err = reconciler().map(date(), &record).unwrap_err();
        assert!(matches!(
            err,
            DomainError::MismatchedSteps {
                arrivals: 3,
                departures: 2
            }
        ));
    }

    #[test]
    fn invalid_train_id_rejected() {
        let mut record = record();
        if let Some(arrival) = record.arrival.as_mut() {
            arrival.train_id = "IC".to_string();
        }
        assert!(matches!(
            reconciler().map(date(), &record),
            Err(DomainError::InvalidTrain(_))
        ));
    }

    #[test]
    fn map_all_skips_malformed() {
        let mut broken = record();
        if let Some(arrival) = broken.arrival.as_mut() {
            arrival.steps[0].time = Some("8h".to_string());
        }

        let chains = reconciler().map_all(date(), &[broken, record(), TwoDirections::default()]);
        assert_eq!(chains.len(), 1);
    }

    #[test]
    fn known_station_reused() {
        let canonical = Station::with_names("Brussels-Central", "Bruxelles-Central", "Brussel-Centraal");
        let store = InMemoryReferenceStore::with_stations([canonical.clone()]);
        let mut reconciler = StopReconciler::new(store, Language::Fr);

        let record = TwoDirections {
            arrival: direction("466", vec![step("BRUXELLES-CENTRAL", Some("09:00"), 0, false)]),
            departure: direction("466", vec![step("Bruxelles-Central", Some("09:01"), 0, false)]),
        };

        let chain = reconciler.map(date(), &record).unwrap().unwrap();
        let station = &chain.head().unwrap().stop().station;
        assert_eq!(station.english_name(), "Brussels-Central");
        assert_eq!(station.dutch_name(), "Brussel-Centraal");
        assert_eq!(reconciler.store().stations().len(), 1);
    }

    #[test]
    fn unknown_values_become_canonical() {
        let mut reconciler = reconciler();
        reconciler.map(date(), &record()).unwrap();
        reconciler.map(date(), &record()).unwrap();

        let store = reconciler.into_store();
        assert_eq!(store.stations().len(), 3);
        assert_eq!(store.train_count(), 1);
        assert!(store.find_station("liege-guillemins", Language::En).is_some());
        assert!(store.find_station("Namur", Language::Fr).is_none());
    }
}
