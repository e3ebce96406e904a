//! Error taxonomy for tasks, the link to the remote service, and the
//! scheduler's boundary operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::registry::TaskId;

/// Why a single task did not complete. The `Display` text is what ends up in
/// the task's `error_message`, so every variant keeps its cause.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Item or source cannot be resolved (stale listing, deleted content, bad id).
    #[error("item not found: {0}")]
    NotFound(String),

    /// Stopped on user request.
    #[error("cancelled")]
    Cancelled,

    /// Link to the remote service failed (disconnect, reset, proxy failure).
    #[error("connection lost: {0}")]
    Link(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Local filesystem failure.
    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure reported by the remote client.
    #[error("{0}")]
    Remote(String),
}

impl TaskError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// Failures that should make the link supervisor reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Link(_))
    }
}

/// Failure talking to the link actor or the client behind it.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Session is not authorized; nothing can run without it.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("link worker has shut down")]
    Closed,

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Error reported by the client itself; carries its classification.
    #[error("{0}")]
    Client(#[from] TaskError),
}

impl From<LinkError> for TaskError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Client(inner) => inner,
            LinkError::Timeout(d) => TaskError::Timeout(d),
            LinkError::Closed => TaskError::Link("link worker has shut down".to_string()),
            LinkError::Unauthorized(msg) => TaskError::Remote(format!("not authorized: {msg}")),
        }
    }
}

/// Errors returned by the scheduler's boundary operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown task {0}")]
    UnknownTask(TaskId),

    /// Retry requested for a task that is still queued or running.
    #[error("task {0} is still active")]
    Busy(TaskId),

    #[error("cannot resolve {0}: {1}")]
    Unresolvable(TaskId, TaskError),
}
