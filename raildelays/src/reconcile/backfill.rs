//! Filling missing expected times from canonical schedules.
//!
//! A canceled stop is often scraped without its expected times. The
//! canonical schedule (what the train normally does at that station) is
//! used instead, with no delay since an expected time is never late.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::domain::{ChainBuilder, LineStop, LineStopChain, Station, StopRef, TimeDelay, TrainLine};

/// Scheduled times of one train at one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSchedule {
    pub arrival: Option<NaiveTime>,
    pub departure: Option<NaiveTime>,
}

/// Source of canonical schedules.
pub trait ScheduleStore {
    fn find(&self, train: TrainLine, station: &Station) -> Option<CanonicalSchedule>;
}

/// One persisted schedule entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScheduleEntry {
    train: TrainLine,
    station: Station,
    #[serde(flatten)]
    schedule: CanonicalSchedule,
}

/// Canonical schedules held in memory, keyed by train and station identity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScheduleStore {
    entries: HashMap<(TrainLine, String), (Station, CanonicalSchedule)>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, train: TrainLine, station: Station, schedule: CanonicalSchedule) {
        self.entries
            .insert((train, station.key()), (station, schedule));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Learn schedules from every stop of `chain` whose expected times are
    /// known. Existing entries are replaced.
    pub fn record_chain(&mut self, chain: &LineStopChain) -> usize {
        let mut learned = 0;
        for stop in chain.iter() {
            if stop.lacks_scheduled_time() {
                continue;
            }
            let stop = stop.stop();
            self.insert(
                stop.train,
                stop.station.clone(),
                CanonicalSchedule {
                    arrival: stop.arrival.expected(),
                    departure: stop.departure.expected(),
                },
            );
            learned += 1;
        }
        learned
    }

    /// Load schedules from a JSON file.
    ///
    /// Returns an empty store if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e),
        };

        let entries: Vec<ScheduleEntry> = serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut store = Self::new();
        for entry in entries {
            store.insert(entry.train, entry.station, entry.schedule);
        }
        Ok(store)
    }

    /// Save schedules to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries: Vec<ScheduleEntry> = self
            .entries
            .iter()
            .map(|((train, _), (station, schedule))| ScheduleEntry {
                train: *train,
                station: station.clone(),
                schedule: *schedule,
            })
            .collect();
        entries.sort_by(|a, b| (a.train, &a.station).cmp(&(b.train, &b.station)));

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn find(&self, train: TrainLine, station: &Station) -> Option<CanonicalSchedule> {
        self.entries
            .get(&(train, station.key()))
            .map(|(_, schedule)| *schedule)
    }
}

/// Rebuilds stop chains with missing expected times filled in.
#[derive(Debug)]
pub struct ScheduleBackfiller<'s, S> {
    store: &'s S,
}

impl<'s, S: ScheduleStore> ScheduleBackfiller<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Rebuild the chain around `anchor`.
    ///
    /// Returns `None` when the anchor lacks an expected time and no
    /// canonical schedule exists for it: the caller must drop the item.
    /// Other stops without a canonical schedule are kept as scraped. The
    /// anchor is resolved first, then its ancestors nearest first, then
    /// its descendants.
    pub fn process(&self, anchor: StopRef<'_>) -> Option<LineStopChain> {
        let Some(resolved) = self.fill(anchor) else {
            info!(stop = ?anchor.stop(), "no canonical schedule, dropping");
            return None;
        };

        let mut builder = ChainBuilder::new(resolved);

        for previous in anchor.ancestors() {
            builder.add_previous(self.fill_or_keep(previous));
        }

        for next in anchor.descendants() {
            builder.add_next(self.fill_or_keep(next));
        }

        let chain = builder.build();
        trace!(stops = chain.len(), "backfilled chain");
        Some(chain)
    }

    /// Process every anchor, dropping those that cannot be resolved.
    pub fn process_all(&self, anchors: &[StopRef<'_>]) -> Vec<LineStopChain> {
        anchors
            .iter()
            .filter_map(|anchor| self.process(*anchor))
            .collect()
    }

    fn fill_or_keep(&self, stop: StopRef<'_>) -> LineStop {
        self.fill(stop).unwrap_or_else(|| stop.stop().clone())
    }

    /// Returns the stop with both expected times from its canonical
    /// schedule, the stop unchanged if it lacks nothing, or `None`.
    fn fill(&self, stop_ref: StopRef<'_>) -> Option<LineStop> {
        let stop = stop_ref.stop();
        if !stop_ref.lacks_scheduled_time() {
            return Some(stop.clone());
        }

        let schedule = self.store.find(stop.train, &stop.station)?;
        debug!(train = %stop.train, station = %stop.station, ?schedule, "backfilling stop");

        Some(
            stop.clone()
                .with_arrival(TimeDelay::new(schedule.arrival, 0))
                .with_departure(TimeDelay::new(schedule.departure, 0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StopIndex, parse_hhmm};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        parse_hhmm(s).unwrap()
    }

    fn train() -> TrainLine {
        TrainLine::new(466)
    }

    fn timed(name: &str, arr: &str, dep: &str, delay_ms: i64) -> LineStop {
        LineStop::new(date(), Station::new(name), train())
            .with_arrival(TimeDelay::new(Some(time(arr)), delay_ms))
            .with_departure(TimeDelay::new(Some(time(dep)), delay_ms))
    }

    fn untimed(name: &str) -> LineStop {
        LineStop::new(date(), Station::new(name), train()).with_canceled(true, true)
    }

    fn chain(stops: Vec<LineStop>) -> LineStopChain {
        let mut stops = stops.into_iter();
        let mut builder = ChainBuilder::new(stops.next().unwrap());
        for stop in stops {
            builder.add_next(stop);
        }
        builder.build()
    }

    fn namur_schedule() -> InMemoryScheduleStore {
        let mut store = InMemoryScheduleStore::new();
        store.insert(
            train(),
            Station::new("Namur"),
            CanonicalSchedule {
                arrival: Some(time("08:40")),
                departure: Some(time("08:42")),
            },
        );
        store
    }

    #[test]
    fn backfills_only_the_stop_lacking_times() {
        let original = chain(vec![
            timed("Liège-Guillemins", "07:58", "08:00", 60_000),
            untimed("Namur"),
            timed("Brussels-Central", "09:20", "09:22", 120_000),
        ]);
        let store = namur_schedule();
        let backfiller = ScheduleBackfiller::new(&store);

        let rebuilt = backfiller.process(original.at(StopIndex(1)).unwrap()).unwrap();

        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt.stops()[0], original.stops()[0]);
        assert_eq!(rebuilt.stops()[2], original.stops()[2]);

        let namur = &rebuilt.stops()[1];
        assert_eq!(namur.arrival, TimeDelay::of(time("08:40")));
        assert_eq!(namur.departure, TimeDelay::of(time("08:42")));
        assert!(namur.canceled_arrival);
    }

    #[test]
    fn unresolvable_anchor_drops_row() {
        let original = chain(vec![
            untimed("Namur"),
            untimed("Liège-Guillemins"),
            untimed("Brussels-Central"),
        ]);
        let store = namur_schedule();
        let backfiller = ScheduleBackfiller::new(&store);

        assert!(backfiller.process(original.at(StopIndex(1)).unwrap()).is_none());
    }

    #[test]
    fn unresolvable_neighbours_kept() {
        let original = chain(vec![
            untimed("Liège-Guillemins"),
            untimed("Namur"),
            untimed("Brussels-Central"),
        ]);
        let store = namur_schedule();
        let backfiller = ScheduleBackfiller::new(&store);

        let rebuilt = backfiller.process(original.at(StopIndex(1)).unwrap()).unwrap();
        assert_eq!(rebuilt.stops()[0], original.stops()[0]);
        assert!(!rebuilt.at(StopIndex(1)).unwrap().lacks_scheduled_time());
        assert_eq!(rebuilt.stops()[2], original.stops()[2]);
    }

    #[test]
    fn complete_anchor_needs_no_schedule() {
        let original = chain(vec![timed("Liège-Guillemins", "07:58", "08:00", 0)]);
        let store = InMemoryScheduleStore::new();
        let backfiller = ScheduleBackfiller::new(&store);

        let rebuilt = backfiller.process(original.head().unwrap()).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn rebuilt_chain_keeps_order_and_links() {
        let original = chain(vec![
            timed("A", "07:00", "07:01", 0),
            timed("B", "07:10", "07:11", 0),
            untimed("Namur"),
            timed("C", "09:00", "09:01", 0),
            timed("D", "09:10", "09:11", 0),
        ]);
        let store = namur_schedule();
        let backfiller = ScheduleBackfiller::new(&store);

        let rebuilt = backfiller.process(original.at(StopIndex(2)).unwrap()).unwrap();
        let names: Vec<&str> = rebuilt
            .iter()
            .map(|s| s.stop().station.english_name())
            .collect();
        assert_eq!(names, vec!["A", "B", "Namur", "C", "D"]);
        assert_eq!(rebuilt.stops()[2].previous(), Some(StopIndex(1)));
        assert_eq!(rebuilt.stops()[2].next(), Some(StopIndex(3)));
    }

    #[test]
    fn process_all_filters_dropped() {
        let resolvable = chain(vec![untimed("Namur"), timed("C", "09:00", "09:01", 0)]);
        let unresolvable = chain(vec![untimed("Mons"), timed("C", "09:00", "09:01", 0)]);
        let store = namur_schedule();
        let backfiller = ScheduleBackfiller::new(&store);

        let chains = backfiller.process_all(&[
            resolvable.head().unwrap(),
            unresolvable.head().unwrap(),
        ]);
        assert_eq!(chains.len(), 1);
    }

    #[test]
    fn record_chain_learns_complete_stops() {
        let observed = chain(vec![
            timed("Liège-Guillemins", "07:58", "08:00", 300_000),
            untimed("Namur"),
        ]);
        let mut store = InMemoryScheduleStore::new();

        assert_eq!(store.record_chain(&observed), 1);
        assert_eq!(
            store.find(train(), &Station::new("LIEGE-GUILLEMINS")),
            Some(CanonicalSchedule {
                arrival: Some(time("07:58")),
                departure: Some(time("08:00")),
            })
        );
        assert!(store.find(train(), &Station::new("Namur")).is_none());
    }

    #[test]
    fn origin_and_terminus_need_one_side() {
        let origin = LineStop::new(date(), Station::new("Liège-Guillemins"), train())
            .with_departure(TimeDelay::new(Some(time("08:00")), 300_000));
        let terminus = LineStop::new(date(), Station::new("Brussels-Central"), train())
            .with_arrival(TimeDelay::new(Some(time("09:00")), 300_000));
        let original = chain(vec![origin, terminus]);

        let mut store = InMemoryScheduleStore::new();
        assert_eq!(store.record_chain(&original), 2);

        // Nothing to fill: delays survive.
        let backfiller = ScheduleBackfiller::new(&store);
        let rebuilt = backfiller.process(original.head().unwrap()).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("schedules.json");

        namur_schedule().save(&path).unwrap();
        let loaded = InMemoryScheduleStore::load(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(loaded.find(train(), &Station::new("namur")).is_some());
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let loaded = InMemoryScheduleStore::load(&dir.path().join("none.json")).unwrap();
        assert!(loaded.is_empty());
    }
}
