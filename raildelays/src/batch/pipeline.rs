//! Runs the reconciliation stages date by date.
//!
//! Every date is processed to completion before the next is fetched:
//! records are linked into chains, missing schedule times are backfilled,
//! chains are mapped onto the commute's legs, late legs are matched
//! against faster trains, delays over the threshold are flagged, and the
//! rows are written. Only then is the run state checkpointed with the
//! date, so an aborted run resumes at the first date not fully written.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::domain::{LineStopChain, ReportRow};
use crate::fetch::{DateDrivenComposer, DateSource, DatedBatch, FetchError};
use crate::reconcile::{
    AlternativeTrainFinder, DayIndex, InMemoryScheduleStore, ReferenceStore, RowMapper,
    ScheduleBackfiller, StopReconciler,
};
use crate::scraper::{DatedRequest, ScrapeError, StreamParser, Transport, TwoDirections};

use super::decider::{FlowDecider, FlowStatus, StepStatus};
use super::ordering::sort_rows;
use super::state::{RunState, RunStateStore, StateError};
use super::threshold::ThresholdFlagger;
use super::writer::{CheckpointedWriter, ItemWriter, WriteError};

/// Any failure that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Yields the scraped records of one date at a time.
pub trait BatchSource {
    /// `None` once there are no dates left.
    async fn next_batch(&mut self) -> Result<Option<DatedBatch<TwoDirections>>, FetchError>;
}

impl<S, T, P> BatchSource for DateDrivenComposer<S, T, P>
where
    S: DateSource,
    T: Transport,
    T::Request: DatedRequest + std::fmt::Debug,
    P: StreamParser<Output = Vec<TwoDirections>>,
{
    async fn next_batch(&mut self) -> Result<Option<DatedBatch<TwoDirections>>, FetchError> {
        self.read().await
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub dates: usize,
    pub rows: usize,
    pub last_date: Option<NaiveDate>,
    pub status: FlowStatus,
}

/// The wired stages of a report run.
pub struct Pipeline<R, W> {
    reconciler: StopReconciler<R>,
    schedules: InMemoryScheduleStore,
    rows: RowMapper,
    finder: AlternativeTrainFinder,
    flagger: ThresholdFlagger,
    decider: FlowDecider,
    writer: CheckpointedWriter<W>,
    state_store: RunStateStore,
}

impl<R, W> Pipeline<R, W>
where
    R: ReferenceStore,
    W: ItemWriter<Item = ReportRow>,
{
    /// The stations of `rows` are resolved against the reconciler's
    /// reference data so they compare equal to scraped stations.
    pub fn new(
        mut reconciler: StopReconciler<R>,
        rows: RowMapper,
        flagger: ThresholdFlagger,
        decider: FlowDecider,
        writer: CheckpointedWriter<W>,
        state_store: RunStateStore,
    ) -> Self {
        let station_a = reconciler.merge_station(rows.station_a().clone());
        let station_b = reconciler.merge_station(rows.station_b().clone());

        Self {
            reconciler,
            schedules: InMemoryScheduleStore::new(),
            rows: RowMapper::new(station_a, station_b),
            finder: AlternativeTrainFinder::new(),
            flagger,
            decider,
            writer,
            state_store,
        }
    }

    /// Start from previously learned canonical schedules.
    pub fn with_schedules(mut self, schedules: InMemoryScheduleStore) -> Self {
        self.schedules = schedules;
        self
    }

    pub fn schedules(&self) -> &InMemoryScheduleStore {
        &self.schedules
    }

    /// Process every date `source` yields, checkpointing after each.
    ///
    /// A failing date aborts the run; the state on disk still points at
    /// the last completed date. Rows flagged over the threshold are
    /// cleared once the run completes and its status is decided.
    pub async fn run<B: BatchSource>(
        &mut self,
        source: &mut B,
        state: &mut RunState,
    ) -> Result<RunSummary, PipelineError> {
        self.writer.open(state)?;

        let mut dates = 0;
        let mut rows = 0;
        let mut last_date = None;

        while let Some(batch) = source.next_batch().await? {
            rows += self.process_date(batch.date, &batch.items, state)?;
            dates += 1;
            last_date = Some(batch.date);
        }

        self.writer.close()?;

        let status = self.decider.decide(Some(StepStatus::Completed), state);
        // Flags describe this run only; a failed run keeps them for its restart.
        state.remove(self.flagger.key());
        self.state_store.save(state)?;
        info!(dates, rows, %status, "run finished");

        Ok(RunSummary {
            dates,
            rows,
            last_date,
            status,
        })
    }

    /// Reconcile, write and checkpoint one date. Returns the rows written.
    pub fn process_date(
        &mut self,
        date: NaiveDate,
        records: &[TwoDirections],
        state: &mut RunState,
    ) -> Result<usize, PipelineError> {
        let chains = self.reconciler.map_all(date, records);
        let learned: usize = chains
            .iter()
            .map(|chain| self.schedules.record_chain(chain))
            .sum();
        debug!(%date, chains = chains.len(), learned, "reconciled records");

        let rows = self.map_rows(&chains);

        let index = DayIndex::new(chains);
        let rows = self.finder.process_all(&rows, &index);
        let mut rows = self.flagger.process_all(rows, state)?;
        sort_rows(&mut rows);

        self.writer.write(&rows)?;
        self.writer.update(state);
        state.set_last_date(date);
        self.state_store.save(state)?;

        info!(%date, rows = rows.len(), "date completed");
        Ok(rows.len())
    }

    /// Map each chain onto the commute, backfilling around the leg's
    /// departure stop. Invalid rows and repeats of the same trip are
    /// dropped.
    fn map_rows(&self, chains: &[LineStopChain]) -> Vec<ReportRow> {
        let backfiller = ScheduleBackfiller::new(&self.schedules);
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for chain in chains {
            let Some(leg) = self.rows.leg(chain) else {
                continue;
            };
            let Some(rebuilt) = backfiller.process(leg.departure) else {
                continue;
            };
            let Some(row) = self.rows.map(&rebuilt) else {
                continue;
            };

            if let Err(e) = row.validate() {
                warn!(error = %e, ?row, "skipping incomplete row");
                continue;
            }
            if !seen.insert(row.clone()) {
                debug!(?row, "duplicate trip");
                continue;
            }
            rows.push(row);
        }
        rows
    }
}
