use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use raildelays::batch::{
    CheckpointedWriter, CsvPageWriter, FlowDecider, Pipeline, PipelineError, RunState,
    RunStateStore, RunSummary, ThresholdFlagger,
};
use raildelays::config::{ReportConfig, SourceConfig};
use raildelays::fetch::{
    CancelHandle, CancelSignal, DateDrivenComposer, DateRange, FetcherConfig, RateLimitedFetcher,
};
use raildelays::reconcile::{InMemoryReferenceStore, InMemoryScheduleStore, RowMapper, StopReconciler};
use raildelays::scraper::{
    DirectoryTransport, HttpConfig, HttpTransport, JsonParser, ScrapeRequest, Transport,
    TwoDirections,
};

/// Reconcile scraped train delays into a commute delay report.
#[derive(Parser)]
struct Args {
    /// JSON configuration file
    #[clap(long)]
    config: Option<PathBuf>,
    /// First date to report (YYYY-MM-DD)
    #[clap(long)]
    from: NaiveDate,
    /// Last date to report, inclusive (defaults to --from)
    #[clap(long)]
    to: Option<NaiveDate>,
    /// Home station, overrides the configuration
    #[clap(long)]
    station_a: Option<String>,
    /// Work station, overrides the configuration
    #[clap(long)]
    station_b: Option<String>,
    /// Read scraped records from this directory instead of the configured source
    #[clap(long)]
    source_dir: Option<PathBuf>,
    #[clap(long)]
    output_dir: Option<PathBuf>,
    #[clap(long)]
    state: Option<PathBuf>,
    #[clap(long)]
    schedules: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<(ReportConfig, NaiveDate, NaiveDate), PipelineError> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::load(path)?,
            None => ReportConfig::default(),
        };

        if let Some(station) = self.station_a {
            config.station_a = station;
        }
        if let Some(station) = self.station_b {
            config.station_b = station;
        }
        if let Some(dir) = self.source_dir {
            config = config.with_source(SourceConfig::Directory { path: dir });
        }
        if let Some(dir) = self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(path) = self.state {
            config = config.with_state_path(path);
        }
        if let Some(path) = self.schedules {
            config = config.with_schedule_path(path);
        }
        config.validate()?;

        Ok((config, self.from, self.to.unwrap_or(self.from)))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (cancel, signal) = CancelSignal::pair();
    tokio::spawn(cancel_on_ctrl_c(cancel));

    match run(Args::parse(), signal).await {
        Ok(summary) => {
            info!(
                dates = summary.dates,
                rows = summary.rows,
                last_date = ?summary.last_date,
                status = %summary.status,
                "report complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "report failed");
            ExitCode::FAILURE
        }
    }
}

async fn cancel_on_ctrl_c(cancel: CancelHandle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupted, aborting after the current wait");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "cannot listen for interrupts"),
    }
}

async fn run(args: Args, signal: CancelSignal) -> Result<RunSummary, PipelineError> {
    let (config, from, to) = args.into_config()?;

    match config.source.clone() {
        SourceConfig::Http {
            base_url,
            timeout_secs,
        } => {
            let transport = HttpTransport::new(HttpConfig::new(base_url).with_timeout(timeout_secs))?;
            run_with(transport, &config, from, to, signal).await
        }
        SourceConfig::Directory { path } => {
            run_with(DirectoryTransport::new(path), &config, from, to, signal).await
        }
    }
}

async fn run_with<T>(
    transport: T,
    config: &ReportConfig,
    from: NaiveDate,
    to: NaiveDate,
    signal: CancelSignal,
) -> Result<RunSummary, PipelineError>
where
    T: Transport<Request = ScrapeRequest>,
{
    let state_store = RunStateStore::new(&config.state_path);
    let mut state: RunState = state_store.load()?;
    let resume_after = state.last_date()?;
    if let Some(last) = resume_after {
        info!(%last, "resuming after last completed date");
    }

    let fetcher_config = FetcherConfig::new()
        .with_transport(transport)
        .with_parser(JsonParser::<Vec<TwoDirections>>::new())
        .with_request(ScrapeRequest::new(config.language))
        .with_retry(config.retry_policy())
        .with_backoff(config.backoff_policy())
        .with_rate_limit(config.rate_limit());
    let fetcher = RateLimitedFetcher::new(fetcher_config, signal)?;
    let dates = DateRange::new(from, to).resume_after(resume_after);
    let mut composer = DateDrivenComposer::new(dates, fetcher);

    let schedules =
        InMemoryScheduleStore::load(&config.schedule_path).map_err(|source| PipelineError::Io {
            path: config.schedule_path.clone(),
            source,
        })?;

    let output = CsvPageWriter::new(&config.output_dir, &config.output_prefix, config.rows_per_file)
        .with_language(config.language);
    let mut writer = CheckpointedWriter::new(&config.writer_name, output)?;
    if let Some(max) = config.max_rows {
        writer = writer.with_max_item_count(max);
    }

    let mut pipeline = Pipeline::new(
        StopReconciler::new(InMemoryReferenceStore::new(), config.language),
        RowMapper::new(config.station_a(), config.station_b()),
        ThresholdFlagger::new(config.threshold_minutes, &config.flag_key)?,
        FlowDecider::new(&config.flag_key)?,
        writer,
        state_store,
    )
    .with_schedules(schedules);

    let result = pipeline.run(&mut composer, &mut state).await;

    // Schedules learned before a failure are still worth keeping.
    pipeline
        .schedules()
        .save(&config.schedule_path)
        .map_err(|source| PipelineError::Io {
            path: config.schedule_path.clone(),
            source,
        })?;

    result
}
