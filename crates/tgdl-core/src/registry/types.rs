//! Types shared by the registry, the admission queue and the executor.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifies one downloadable item inside one source. Item ids are only
/// unique per source, so both halves are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub source_id: i64,
    pub item_id: i64,
}

impl TaskId {
    pub fn new(source_id: i64, item_id: i64) -> Self {
        Self { source_id, item_id }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskIdError(String);

impl fmt::Display for ParseTaskIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task id {:?} (expected <source>:<item>)", self.0)
    }
}

impl std::error::Error for ParseTaskIdError {}

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTaskIdError(s.to_string());
        let (source, item) = s.trim().split_once(':').ok_or_else(err)?;
        Ok(TaskId {
            source_id: source.trim().parse().map_err(|_| err())?,
            item_id: item.trim().parse().map_err(|_| err())?,
        })
    }
}

// Serialized as "<source>:<item>" so it can key a JSON object.
impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    Queued,
    Downloading,
    Done,
    Skipped,
    Error,
    Cancelled,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Waiting => "waiting",
            TaskState::Queued => "queued",
            TaskState::Downloading => "downloading",
            TaskState::Done => "done",
            TaskState::Skipped => "skipped",
            TaskState::Error => "error",
            TaskState::Cancelled => "cancelled",
        }
    }

    /// No automatic transition leaves these states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Skipped | TaskState::Error | TaskState::Cancelled
        )
    }

    /// Queued or downloading: the record belongs to the scheduler.
    pub fn is_live(self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Downloading)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placeholder shown until the item has been resolved.
pub const UNKNOWN_NAME: &str = "unknown";

/// Observable status of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub display_name: String,
    pub state: TaskState,
    pub bytes_transferred: u64,
    pub bytes_total: u64,
    pub progress_percent: u8,
    /// Bytes per second; only while downloading.
    pub transfer_rate: Option<f64>,
    pub error_message: Option<String>,
    pub queue_position: Option<usize>,
    pub queue_size: Option<usize>,
    pub source_label: String,
    /// Last rate recomputation: (when, bytes at that time).
    #[serde(skip)]
    pub(crate) rate_mark: Option<(Instant, u64)>,
}

impl StatusRecord {
    pub fn waiting(display_name: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            state: TaskState::Waiting,
            bytes_transferred: 0,
            bytes_total: 0,
            progress_percent: 0,
            transfer_rate: None,
            error_message: None,
            queue_position: None,
            queue_size: None,
            source_label: source_label.into(),
            rate_mark: None,
        }
    }

    pub(crate) fn clear_queue_fields(&mut self) {
        self.queue_position = None;
        self.queue_size = None;
    }
}

/// `floor(transferred / total * 100)`, or 0 when the total is unknown.
pub fn progress_percent(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(transferred) * 100) / u128::from(total);
    pct.min(100) as u8
}

/// A request waiting for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub source_id: i64,
    pub item_id: i64,
    pub source_label: String,
}

impl QueueEntry {
    pub fn new(task_id: TaskId, source_label: impl Into<String>) -> Self {
        Self {
            task_id,
            source_id: task_id.source_id,
            item_id: task_id.item_id,
            source_label: source_label.into(),
        }
    }
}
