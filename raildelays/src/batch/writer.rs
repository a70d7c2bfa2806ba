//! Restart-safe, index-aware item writer.
//!
//! [`CheckpointedWriter`] tracks where the next item goes and how many
//! slots have been filled, and persists both in the [`RunState`] at each
//! checkpoint. After a restart it seeks back to the persisted count so
//! already written items are not written twice, and discards whatever an
//! interrupted run wrote past that count.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::domain::ReportRow;

use super::state::{RunState, StateError};

const WRITE_COUNT: &str = "write.count";
const WRITE_COUNT_MAX: &str = "write.count.max";

/// Errors raised while writing items.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("writer name must not be empty")]
    EmptyName,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// An item that may ask to be written at a fixed position.
pub trait IndexedItem {
    fn index(&self) -> Option<u64>;
}

impl IndexedItem for ReportRow {
    fn index(&self) -> Option<u64> {
        self.index
    }
}

/// The resource-specific half of a [`CheckpointedWriter`].
pub trait ItemWriter {
    type Item;

    fn do_open(&mut self) -> Result<(), WriteError>;

    /// Write `item` at `position`.
    ///
    /// Returns `true` if a new slot was filled, `false` if an existing one
    /// was replaced.
    fn do_write(&mut self, position: u64, item: &Self::Item) -> Result<bool, WriteError>;

    /// Discard every item at `position` or later.
    fn truncate_from(&mut self, position: u64) -> Result<(), WriteError>;

    fn do_close(&mut self) -> Result<(), WriteError>;
}

/// Wraps an [`ItemWriter`] with a write cursor and a ceiling persisted
/// across restarts.
///
/// Not safe for several writers sharing the same positions.
#[derive(Debug)]
pub struct CheckpointedWriter<W> {
    inner: W,
    name: String,
    current_item_index: u64,
    current_item_count: u64,
    max_item_count: u64,
    use_item_index: bool,
    save_state: bool,
}

impl<W> CheckpointedWriter<W>
where
    W: ItemWriter,
    W::Item: IndexedItem,
{
    /// `name` namespaces this writer's keys in the run state.
    pub fn new(name: impl Into<String>, inner: W) -> Result<Self, WriteError> {
        let name = name.into();
        if name.is_empty() {
            return Err(WriteError::EmptyName);
        }
        Ok(Self {
            inner,
            name,
            current_item_index: 0,
            current_item_count: 0,
            max_item_count: u64::MAX,
            use_item_index: true,
            save_state: true,
        })
    }

    /// Stop counting writes once `max` slots are filled.
    pub fn with_max_item_count(mut self, max: u64) -> Self {
        self.max_item_count = max;
        self
    }

    /// Whether an item's own index overrides the cursor.
    pub fn with_item_index(mut self, enabled: bool) -> Self {
        self.use_item_index = enabled;
        self
    }

    /// Whether counters are restored on open and persisted on update.
    pub fn with_save_state(mut self, enabled: bool) -> Self {
        self.save_state = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn current_item_index(&self) -> u64 {
        self.current_item_index
    }

    pub fn current_item_count(&self) -> u64 {
        self.current_item_count
    }

    pub fn max_item_count(&self) -> u64 {
        self.max_item_count
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}.{}", self.name, suffix)
    }

    /// Open the resource and restore the counters from `state`.
    ///
    /// Slots at or past the restored count belong to work that never
    /// reached a checkpoint and are truncated, so they are filled again
    /// rather than counted as replacements.
    pub fn open(&mut self, state: &RunState) -> Result<(), WriteError> {
        self.inner.do_open()?;

        if !self.save_state {
            return Ok(());
        }

        if let Some(max) = state.get_u64(&self.key(WRITE_COUNT_MAX))? {
            self.max_item_count = max;
        }

        let count = state.get_u64(&self.key(WRITE_COUNT))?.unwrap_or(0);
        if count > 0 && count < self.max_item_count {
            self.current_item_index = count;
        }
        self.current_item_count = count;
        self.inner.truncate_from(count)?;

        debug!(
            writer = %self.name,
            index = self.current_item_index,
            count = self.current_item_count,
            "opened writer"
        );
        Ok(())
    }

    /// Write `items` in order.
    ///
    /// A failed write stops the batch before the cursor or the count move
    /// past the failing item.
    pub fn write(&mut self, items: &[W::Item]) -> Result<(), WriteError> {
        for item in items {
            if self.use_item_index
                && let Some(index) = item.index()
            {
                self.current_item_index = index;
            }

            if self.current_item_count < self.max_item_count {
                let filled = self.inner.do_write(self.current_item_index, item)?;
                if filled {
                    self.current_item_count += 1;
                }
                trace!(position = self.current_item_index, filled, "wrote item");
            } else {
                trace!(position = self.current_item_index, "ceiling reached, item skipped");
            }

            self.current_item_index += 1;
        }
        Ok(())
    }

    /// Persist the counters into `state`.
    pub fn update(&self, state: &mut RunState) {
        if !self.save_state {
            return;
        }

        state.put_u64(&self.key(WRITE_COUNT), self.current_item_count);
        if self.max_item_count < u64::MAX {
            state.put_u64(&self.key(WRITE_COUNT_MAX), self.max_item_count);
        }
    }

    /// Release the resource, then reset the in-memory counters.
    ///
    /// Persisted counters are untouched until the next [`update`](Self::update).
    pub fn close(&mut self) -> Result<(), WriteError> {
        self.inner.do_close()?;
        self.current_item_index = 0;
        self.current_item_count = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Item carrying an optional explicit position.
    #[derive(Debug, Clone)]
    struct Item(Option<u64>);

    impl IndexedItem for Item {
        fn index(&self) -> Option<u64> {
            self.0
        }
    }

    /// Records writes by slot; can be told to fail at a position.
    #[derive(Debug, Default)]
    struct SlotWriter {
        slots: BTreeMap<u64, usize>,
        writes: usize,
        fail_at: Option<u64>,
        opened: bool,
        closed: bool,
    }

    impl ItemWriter for SlotWriter {
        type Item = Item;

        fn do_open(&mut self) -> Result<(), WriteError> {
            self.opened = true;
            Ok(())
        }

        fn do_write(&mut self, position: u64, _item: &Item) -> Result<bool, WriteError> {
            if self.fail_at == Some(position) {
                return Err(WriteError::Io {
                    path: PathBuf::from("slot"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.writes += 1;
            Ok(self.slots.insert(position, self.writes).is_none())
        }

        fn truncate_from(&mut self, position: u64) -> Result<(), WriteError> {
            self.slots.retain(|slot, _| *slot < position);
            Ok(())
        }

        fn do_close(&mut self) -> Result<(), WriteError> {
            self.closed = true;
            Ok(())
        }
    }

    fn writer() -> CheckpointedWriter<SlotWriter> {
        CheckpointedWriter::new("report", SlotWriter::default()).unwrap()
    }

    fn items(n: usize) -> Vec<Item> {
        vec![Item(None); n]
    }

    #[test]
    fn resumes_at_persisted_count() {
        let mut state = RunState::new();

        let mut first = writer();
        first.open(&state).unwrap();
        first.write(&items(5)).unwrap();
        first.update(&mut state);
        first.close().unwrap();

        let mut second = writer();
        second.open(&state).unwrap();
        assert_eq!(second.current_item_index(), 5);
        assert_eq!(second.current_item_count(), 5);

        second.write(&items(1)).unwrap();
        assert!(second.inner().slots.contains_key(&5));
        assert!(!second.inner().slots.contains_key(&0));
    }

    #[test]
    fn open_discards_writes_past_checkpoint() {
        let mut state = RunState::new();
        state.put_u64("report.write.count", 2);

        // Slots 2..4 were written by a run that failed before its checkpoint.
        let stale = SlotWriter {
            slots: (0..5).map(|slot| (slot, 1)).collect(),
            ..SlotWriter::default()
        };
        let mut writer = CheckpointedWriter::new("report", stale).unwrap();
        writer.open(&state).unwrap();

        let slots: Vec<u64> = writer.inner().slots.keys().copied().collect();
        assert_eq!(slots, vec![0, 1]);

        writer.write(&items(3)).unwrap();
        assert_eq!(writer.current_item_count(), 5);
    }

    #[test]
    fn fresh_state_discards_everything() {
        let stale = SlotWriter {
            slots: (0..3).map(|slot| (slot, 1)).collect(),
            ..SlotWriter::default()
        };
        let mut writer = CheckpointedWriter::new("report", stale).unwrap();
        writer.open(&RunState::new()).unwrap();
        assert!(writer.inner().slots.is_empty());

        writer.write(&items(3)).unwrap();
        assert_eq!(writer.current_item_count(), 3);
    }

    #[test]
    fn ceiling_stops_count_not_index() {
        let mut writer = writer().with_max_item_count(3);
        writer.open(&RunState::new()).unwrap();
        writer.write(&items(5)).unwrap();

        assert_eq!(writer.current_item_count(), 3);
        assert_eq!(writer.current_item_index(), 5);
        assert_eq!(writer.inner().slots.len(), 3);
    }

    #[test]
    fn explicit_index_jumps() {
        let mut writer = writer();
        writer.open(&RunState::new()).unwrap();
        writer.write(&[Item(Some(10)), Item(None), Item(Some(2))]).unwrap();

        let slots: Vec<u64> = writer.inner().slots.keys().copied().collect();
        assert_eq!(slots, vec![2, 10, 11]);
        assert_eq!(writer.current_item_index(), 3);
    }

    #[test]
    fn explicit_index_ignored_when_disabled() {
        let mut writer = writer().with_item_index(false);
        writer.open(&RunState::new()).unwrap();
        writer.write(&[Item(Some(10)), Item(Some(20))]).unwrap();

        let slots: Vec<u64> = writer.inner().slots.keys().copied().collect();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn replaced_slot_not_counted() {
        let mut writer = writer();
        writer.open(&RunState::new()).unwrap();
        writer.write(&[Item(Some(4)), Item(Some(4))]).unwrap();

        assert_eq!(writer.current_item_count(), 1);
        assert_eq!(writer.current_item_index(), 5);
    }

    #[test]
    fn failed_write_does_not_advance() {
        let mut writer = CheckpointedWriter::new(
            "report",
            SlotWriter {
                fail_at: Some(2),
                ..SlotWriter::default()
            },
        )
        .unwrap();
        writer.open(&RunState::new()).unwrap();

        let err = writer.write(&items(4)).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
        assert_eq!(writer.current_item_count(), 2);
        assert_eq!(writer.current_item_index(), 2);

        let mut state = RunState::new();
        writer.update(&mut state);
        assert_eq!(state.get_u64("report.write.count").unwrap(), Some(2));
    }

    #[test]
    fn update_persists_ceiling_only_when_set() {
        let mut state = RunState::new();
        let mut unbounded = writer();
        unbounded.open(&state).unwrap();
        unbounded.write(&items(2)).unwrap();
        unbounded.update(&mut state);

        assert_eq!(state.get_u64("report.write.count").unwrap(), Some(2));
        assert!(!state.contains_key("report.write.count.max"));

        let mut bounded = writer().with_max_item_count(3);
        bounded.open(&RunState::new()).unwrap();
        bounded.update(&mut state);
        assert_eq!(state.get_u64("report.write.count.max").unwrap(), Some(3));
    }

    #[test]
    fn persisted_ceiling_restored() {
        let mut state = RunState::new();
        state.put_u64("report.write.count", 3);
        state.put_u64("report.write.count.max", 3);

        let mut writer = writer();
        writer.open(&state).unwrap();
        assert_eq!(writer.max_item_count(), 3);
        // Already at the ceiling: no seek.
        assert_eq!(writer.current_item_index(), 0);

        writer.write(&items(2)).unwrap();
        assert!(writer.inner().slots.is_empty());
    }

    #[test]
    fn stateless_writer_ignores_state() {
        let mut state = RunState::new();
        state.put_u64("report.write.count", 7);

        let mut writer = writer().with_save_state(false);
        writer.open(&state).unwrap();
        assert_eq!(writer.current_item_index(), 0);

        writer.write(&items(1)).unwrap();
        writer.update(&mut state);
        assert_eq!(state.get_u64("report.write.count").unwrap(), Some(7));
    }

    #[test]
    fn close_tears_down_then_resets() {
        let mut state = RunState::new();
        let mut writer = writer();
        writer.open(&state).unwrap();
        assert!(writer.inner().opened);

        writer.write(&items(3)).unwrap();
        writer.update(&mut state);
        writer.close().unwrap();

        assert!(writer.inner().closed);
        assert_eq!(writer.current_item_index(), 0);
        assert_eq!(writer.current_item_count(), 0);
        assert_eq!(state.get_u64("report.write.count").unwrap(), Some(3));
    }

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(
            CheckpointedWriter::new("", SlotWriter::default()),
            Err(WriteError::EmptyName)
        ));
    }

    #[test]
    fn error_display() {
        let err = WriteError::Io {
            path: PathBuf::from("out/report_000.csv"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(err.to_string(), "failed to write out/report_000.csv: disk full");
    }
}
