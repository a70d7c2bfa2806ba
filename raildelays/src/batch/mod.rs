//! Batch stages: flagging, flow decision, checkpointed output and the
//! per-date pipeline that wires everything together.
//!
//! State that must survive a restart lives in a [`RunState`], threaded
//! by reference through the stages that read or write it.

mod csv_output;
mod decider;
mod ordering;
mod pipeline;
mod state;
mod threshold;
mod writer;

pub use csv_output::CsvPageWriter;
pub use decider::{FlowDecider, FlowStatus, StepStatus};
pub use ordering::{compare, sort_rows};
pub use pipeline::{BatchSource, Pipeline, PipelineError, RunSummary};
pub use state::{LAST_DATE_KEY, RunState, RunStateStore, StateError};
pub use threshold::{DEFAULT_THRESHOLD, ThresholdFlagger};
pub use writer::{CheckpointedWriter, IndexedItem, ItemWriter, WriteError};
