//! Progress snapshots: pulled with `Scheduler::snapshot`, pushed with
//! `Scheduler::stream_progress`.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use crate::registry::{StatusRecord, TaskId, TaskState};

/// Whole-registry view plus queue counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tasks: BTreeMap<TaskId, StatusRecord>,
    /// Batches holding a slot.
    pub active: usize,
    /// Entries waiting in line.
    pub queued: usize,
    pub max: usize,
    /// At least one task, and every task terminal.
    pub complete: bool,
}

impl Snapshot {
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.values().filter(|r| r.state == state).count()
    }
}

/// Emits `take()` right away and then every `interval`, ending after the
/// first complete snapshot.
pub(super) fn poll_stream<F>(interval: Duration, take: F) -> impl Stream<Item = Snapshot> + Send
where
    F: Fn() -> Snapshot + Send + Sync + 'static,
{
    stream::unfold((take, true, false), move |(take, first, finished)| async move {
        if finished {
            return None;
        }
        if !first {
            tokio::time::sleep(interval).await;
        }
        let snap = take();
        let done = snap.complete;
        Some((snap, (take, false, done)))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::StreamExt;

    use super::*;

    fn snap(complete: bool) -> Snapshot {
        Snapshot {
            tasks: BTreeMap::new(),
            active: 0,
            queued: 0,
            max: 3,
            complete,
        }
    }

    #[tokio::test]
    async fn stream_ends_after_first_complete() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let s = poll_stream(Duration::from_millis(1), move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            snap(n >= 2)
        });
        let all: Vec<Snapshot> = s.collect().await;
        assert_eq!(all.len(), 3);
        assert!(all[2].complete);
        assert!(!all[1].complete);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(snap(false)).unwrap();
        assert_eq!(json["max"], 3);
        assert_eq!(json["complete"], false);
        assert!(json["tasks"].as_object().unwrap().is_empty());
    }
}
