//! Cancellation: a flag set keyed by task id plus per-transfer tokens.
//!
//! A flag can be raised before the task starts (queued or waiting) and is
//! picked up when the executor reaches it. While a transfer runs, the
//! executor registers a `CancellationToken`; raising the flag also fires the
//! token so a transfer that is stuck between progress ticks stops too.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::registry::TaskId;

/// Returned by a progress callback to the transfer that invoked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferControl {
    Continue,
    Abort,
}

#[derive(Debug, Default)]
struct Inner {
    flagged: HashSet<TaskId>,
    running: HashMap<TaskId, CancellationToken>,
}

/// Shared cancellation state, injected into the scheduler and executors.
#[derive(Debug, Default)]
pub struct CancelSet {
    inner: Mutex<Inner>,
}

impl CancelSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the flag for `id` and fire its transfer token if one is running.
    pub fn request(&self, id: TaskId) {
        let mut inner = self.lock();
        inner.flagged.insert(id);
        if let Some(token) = inner.running.get(&id) {
            token.cancel();
        }
    }

    pub fn is_requested(&self, id: &TaskId) -> bool {
        self.lock().flagged.contains(id)
    }

    /// Drop a stale flag (retry or fresh submission).
    pub fn clear(&self, id: &TaskId) {
        self.lock().flagged.remove(id);
    }

    /// Register a running transfer; the returned token is already cancelled if
    /// the flag went up in the meantime.
    pub fn register(&self, id: TaskId) -> CancellationToken {
        let token = CancellationToken::new();
        let mut inner = self.lock();
        if inner.flagged.contains(&id) {
            token.cancel();
        }
        inner.running.insert(id, token.clone());
        token
    }

    /// Call when the transfer finishes, whatever the outcome.
    pub fn unregister(&self, id: &TaskId) {
        self.lock().running.remove(id);
    }

    pub fn control_for(&self, id: &TaskId) -> TransferControl {
        if self.is_requested(id) {
            TransferControl::Abort
        } else {
            TransferControl::Continue
        }
    }
}

/// Socket a running `tgdl get` listens on for cancel/retry/status requests.
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("tgdl")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_before_start_survives() {
        let set = CancelSet::new();
        let id = TaskId::new(1, 2);
        set.request(id);
        assert!(set.is_requested(&id));
        let token = set.register(id);
        assert!(token.is_cancelled());
        assert_eq!(set.control_for(&id), TransferControl::Abort);
    }

    #[test]
    fn request_fires_running_token() {
        let set = CancelSet::new();
        let id = TaskId::new(1, 2);
        let token = set.register(id);
        assert!(!token.is_cancelled());
        set.request(id);
        assert!(token.is_cancelled());
        set.unregister(&id);
    }

    #[test]
    fn clear_resets_flag() {
        let set = CancelSet::new();
        let id = TaskId::new(3, 4);
        set.request(id);
        set.clear(&id);
        assert_eq!(set.control_for(&id), TransferControl::Continue);
        assert!(!set.register(id).is_cancelled());
    }
}
