//! In-memory task registry: one status record per task id.
//!
//! The registry owns its lock and is shared as `Arc<TaskRegistry>`. Every
//! mutation touches exactly one record under the write lock, so a reader
//! taking a snapshot sees each record whole, never fields of two tasks mixed.

mod types;

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub use types::{
    progress_percent, ParseTaskIdError, QueueEntry, StatusRecord, TaskId, TaskState, UNKNOWN_NAME,
};

/// How a task left the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done { size: u64 },
    Skipped { size: u64 },
    Cancelled,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    records: RwLock<HashMap<TaskId, StatusRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, StatusRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, StatusRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_record<R>(&self, id: &TaskId, f: impl FnOnce(&mut StatusRecord) -> R) -> Option<R> {
        self.write().get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<StatusRecord> {
        self.read().get(id).cloned()
    }

    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.read().get(id).map(|r| r.state)
    }

    /// Installs a fresh `waiting` record, replacing a waiting or terminal one.
    /// Returns false (and leaves the old record alone) while the task is
    /// queued or downloading.
    pub fn begin(&self, id: TaskId, display_name: &str, source_label: &str) -> bool {
        let mut records = self.write();
        if let Some(existing) = records.get(&id) {
            if existing.state.is_live() {
                return false;
            }
        }
        records.insert(id, StatusRecord::waiting(display_name, source_label));
        true
    }

    pub fn mark_queued(&self, id: &TaskId, position: usize, size: usize) {
        self.with_record(id, |r| {
            if r.state.is_terminal() {
                return;
            }
            r.state = TaskState::Queued;
            r.queue_position = Some(position);
            r.queue_size = Some(size);
        });
    }

    /// Rewrites positions of everything still in line. `line` is in FIFO order.
    pub fn reposition(&self, line: &[TaskId]) {
        let size = line.len();
        let mut records = self.write();
        for (idx, id) in line.iter().enumerate() {
            if let Some(r) = records.get_mut(id) {
                if r.state == TaskState::Queued {
                    r.queue_position = Some(idx + 1);
                    r.queue_size = Some(size);
                }
            }
        }
    }

    /// Popped from the line and handed to an executor.
    pub fn mark_dispatched(&self, id: &TaskId) {
        self.with_record(id, |r| {
            if r.state == TaskState::Queued {
                r.state = TaskState::Waiting;
                r.clear_queue_fields();
            }
        });
    }

    pub fn set_display_name(&self, id: &TaskId, name: &str) {
        self.with_record(id, |r| {
            if !r.state.is_terminal() {
                r.display_name = name.to_string();
            }
        });
    }

    /// Enters `downloading` with zero bytes. Refused for terminal records
    /// (e.g. force-cancelled while the item was being resolved).
    pub fn start_download(&self, id: &TaskId, total: u64, now: Instant) -> bool {
        self.with_record(id, |r| {
            if r.state.is_terminal() {
                return false;
            }
            r.state = TaskState::Downloading;
            r.bytes_transferred = 0;
            r.bytes_total = total;
            r.progress_percent = 0;
            r.transfer_rate = None;
            r.error_message = None;
            r.clear_queue_fields();
            r.rate_mark = Some((now, 0));
            true
        })
        .unwrap_or(false)
    }

    /// Applies one progress tick. Ignored unless the record is downloading;
    /// bytes never move backwards. The rate is recomputed only once `window`
    /// has elapsed since the previous recomputation.
    pub fn record_progress(
        &self,
        id: &TaskId,
        transferred: u64,
        total: u64,
        now: Instant,
        window: Duration,
    ) -> bool {
        self.with_record(id, |r| {
            if r.state != TaskState::Downloading {
                return false;
            }
            if total > 0 {
                r.bytes_total = total;
            }
            r.bytes_transferred = r.bytes_transferred.max(transferred);
            r.progress_percent = progress_percent(r.bytes_transferred, r.bytes_total);

            let (mark_at, mark_bytes) = *r.rate_mark.get_or_insert((now, 0));
            let elapsed = now.saturating_duration_since(mark_at);
            if elapsed >= window && !elapsed.is_zero() {
                let delta = r.bytes_transferred.saturating_sub(mark_bytes);
                r.transfer_rate = Some(delta as f64 / elapsed.as_secs_f64());
                r.rate_mark = Some((now, r.bytes_transferred));
            }
            true
        })
        .unwrap_or(false)
    }

    /// Moves a non-terminal record into its final state. Returns false if the
    /// record was already terminal (e.g. force-cancelled) or is missing.
    pub fn finish(&self, id: &TaskId, outcome: Outcome) -> bool {
        self.with_record(id, |r| {
            if r.state.is_terminal() {
                return false;
            }
            match outcome {
                Outcome::Done { size } => {
                    r.state = TaskState::Done;
                    r.bytes_transferred = size;
                    r.bytes_total = size;
                    r.progress_percent = 100;
                    r.error_message = None;
                }
                Outcome::Skipped { size } => {
                    r.state = TaskState::Skipped;
                    r.bytes_transferred = size;
                    r.bytes_total = size;
                    r.progress_percent = 100;
                    r.error_message = None;
                }
                Outcome::Cancelled => {
                    r.state = TaskState::Cancelled;
                    r.error_message = Some("cancelled".to_string());
                }
                Outcome::Failed(msg) => {
                    r.state = TaskState::Error;
                    r.error_message = Some(msg);
                }
            }
            r.transfer_rate = None;
            r.rate_mark = None;
            r.clear_queue_fields();
            true
        })
        .unwrap_or(false)
    }

    /// Marks a non-terminal record cancelled right away, before the executor
    /// notices the flag.
    pub fn force_cancel(&self, id: &TaskId) -> bool {
        self.finish(id, Outcome::Cancelled)
    }

    /// Removes terminal records; `None` means every terminal record.
    pub fn clear_terminal(&self, ids: Option<&[TaskId]>) -> usize {
        let mut records = self.write();
        match ids {
            Some(ids) => ids
                .iter()
                .filter(|id| {
                    let terminal = records.get(id).is_some_and(|r| r.state.is_terminal());
                    terminal && records.remove(id).is_some()
                })
                .count(),
            None => {
                let before = records.len();
                records.retain(|_, r| !r.state.is_terminal());
                before - records.len()
            }
        }
    }

    pub fn snapshot(&self) -> BTreeMap<TaskId, StatusRecord> {
        self.read().iter().map(|(k, v)| (*k, v.clone())).collect()
    }

}

/// True iff there is at least one record and all of them are terminal.
/// Takes a snapshot so completion always agrees with the records it came from.
pub fn is_complete(records: &BTreeMap<TaskId, StatusRecord>) -> bool {
    !records.is_empty() && records.values().all(|r| r.state.is_terminal())
}
