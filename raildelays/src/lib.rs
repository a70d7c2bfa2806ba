//! Restart-safe train delay reconciliation.
//!
//! Scrapes realtime delays date by date, links them into per-train stop
//! chains, fills holes from canonical schedules, finds the faster trains a
//! commuter could have taken, and writes a paginated delay report while
//! checkpointing progress so an interrupted run picks up where it stopped.

pub mod batch;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod reconcile;
pub mod scraper;
