//! Download task scheduler.
//!
//! Submissions go through the admission queue (at most `max_concurrent`
//! batches hold a slot); each admitted entry runs on its own executor task.
//! A finished executor drops its slot guard, which releases the slot and
//! drains the line. A pump task drains periodically as well.

mod admission;
mod execute;
mod guard;
mod progress;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::config::TgdlConfig;
use crate::control::CancelSet;
use crate::error::SchedulerError;
use crate::link::LinkSupervisor;
use crate::registry::{self, QueueEntry, TaskId, TaskRegistry, UNKNOWN_NAME};

use self::admission::{AdmissionQueue, Admitted};
use self::guard::SlotGuard;
pub use self::progress::Snapshot;

/// Acknowledgement of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Tasks taken; ids already queued or running are not counted.
    pub accepted: usize,
    /// Entries in line after the submission.
    pub queued: usize,
    pub active: usize,
    pub max_concurrent: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) download_root: PathBuf,
    pub(crate) dispatch_delay: Duration,
    pub(crate) queue_poll: Duration,
    pub(crate) progress_interval: Duration,
    pub(crate) rate_window: Duration,
    /// How long an executor waits for a reconnect before giving up.
    pub(crate) link_wait: Duration,
}

impl Settings {
    fn from_config(cfg: &TgdlConfig) -> Self {
        Self {
            download_root: cfg.download_root(),
            dispatch_delay: cfg.dispatch_delay(),
            queue_poll: cfg.queue_poll_interval(),
            progress_interval: cfg.progress_interval(),
            rate_window: cfg.rate_window(),
            link_wait: cfg.metadata_timeout(),
        }
    }
}

/// State shared by the scheduler handle, executors and slot guards.
pub(crate) struct Shared {
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) cancels: Arc<CancelSet>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) supervisor: Arc<LinkSupervisor>,
    pub(crate) settings: Settings,
    admission: Mutex<AdmissionQueue>,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, AdmissionQueue> {
        self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Starts an executor for an entry that already holds a slot.
fn dispatch(shared: &Arc<Shared>, entry: QueueEntry) {
    let guard = SlotGuard {
        shared: Arc::clone(shared),
        tasks: vec![entry.task_id],
    };
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let _guard = guard;
        execute::run_batch(&shared, std::slice::from_ref(&entry)).await;
    });
}

/// Pops entries while slots are free, pacing dispatches by the dispatch
/// delay. Returns how many were dispatched.
async fn drain(shared: &Arc<Shared>) -> usize {
    let mut dispatched = 0;
    loop {
        if dispatched > 0 && !shared.settings.dispatch_delay.is_zero() {
            tokio::time::sleep(shared.settings.dispatch_delay).await;
        }
        let entry = {
            let mut queue = shared.queue();
            let entry = queue.pop_ready();
            if let Some(entry) = &entry {
                shared.registry.mark_dispatched(&entry.task_id);
                shared.registry.reposition(&queue.line_ids());
            }
            entry
        };
        let Some(entry) = entry else {
            break;
        };
        tracing::debug!(task = %entry.task_id, "dispatching queued task");
        dispatch(shared, entry);
        dispatched += 1;
    }
    dispatched
}

/// Cheap, cloneable handle to the scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Shared>,
}

impl Scheduler {
    pub fn new(catalog: Arc<Catalog>, supervisor: Arc<LinkSupervisor>, cfg: &TgdlConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                registry: Arc::new(TaskRegistry::new()),
                cancels: Arc::new(CancelSet::new()),
                catalog,
                supervisor,
                settings: Settings::from_config(cfg),
                admission: Mutex::new(AdmissionQueue::new(cfg.max_concurrent())),
            }),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Registers one task per item and admits them. Items that are already
    /// queued or running are left alone. Must be called inside a tokio
    /// runtime.
    pub fn submit(&self, source_label: &str, source_id: i64, item_ids: &[i64]) -> SubmitReceipt {
        let shared = &self.inner;
        let mut seen = HashSet::new();
        let mut to_run = Vec::new();
        let mut accepted = 0;

        let (queued, active, max) = {
            let mut queue = shared.queue();
            for &item_id in item_ids {
                let id = TaskId::new(source_id, item_id);
                if !seen.insert(id) || queue.contains(&id) {
                    continue;
                }
                let name = shared
                    .catalog
                    .cached_item(&id)
                    .map(|item| item.file_name())
                    .unwrap_or_else(|| UNKNOWN_NAME.to_string());
                if !shared.registry.begin(id, &name, source_label) {
                    continue;
                }
                shared.cancels.clear(&id);
                match queue.admit(QueueEntry::new(id, source_label)) {
                    Admitted::Run(entry) => to_run.push(entry),
                    Admitted::Queued { position, size } => {
                        shared.registry.mark_queued(&id, position, size);
                    }
                    Admitted::Duplicate => continue,
                }
                accepted += 1;
            }
            shared.registry.reposition(&queue.line_ids());
            (queue.queued(), queue.active(), queue.cap())
        };

        for entry in to_run {
            dispatch(shared, entry);
        }
        tracing::info!(
            label = source_label,
            source_id,
            accepted,
            queued,
            active,
            "tasks submitted"
        );
        SubmitReceipt {
            accepted,
            queued,
            active,
            max_concurrent: max,
        }
    }

    /// Dispatches queued entries while slots are free.
    pub async fn drain(&self) -> usize {
        drain(&self.inner).await
    }

    /// Background task draining the line every `queue_poll_ms`.
    pub fn spawn_queue_pump(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(shared.settings.queue_poll);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                drain(&shared).await;
            }
        })
    }

    /// Stops a task wherever it is: removed from the line if queued, its
    /// transfer aborted if running. The record turns `cancelled` at once.
    pub fn cancel(&self, id: TaskId) -> Result<(), SchedulerError> {
        let shared = &self.inner;
        let known = {
            let mut queue = shared.queue();
            let known = queue.contains(&id) || shared.registry.get(&id).is_some();
            if known {
                shared.cancels.request(id);
                if queue.remove(&id) {
                    shared.registry.reposition(&queue.line_ids());
                }
            }
            known
        };
        if !known {
            return Err(SchedulerError::UnknownTask(id));
        }
        shared.registry.force_cancel(&id);
        tracing::info!(task = %id, "cancel requested");
        Ok(())
    }

    /// Runs a finished task again. The item must still resolve.
    pub async fn retry(&self, id: TaskId) -> Result<SubmitReceipt, SchedulerError> {
        let shared = &self.inner;
        let record = shared
            .registry
            .get(&id)
            .ok_or(SchedulerError::UnknownTask(id))?;
        if shared.queue().contains(&id) || record.state.is_live() {
            return Err(SchedulerError::Busy(id));
        }
        shared
            .catalog
            .resolve(id)
            .await
            .map_err(|e| SchedulerError::Unresolvable(id, e))?;
        shared.cancels.clear(&id);
        tracing::info!(task = %id, "retrying");
        let receipt = self.submit(&record.source_label, id.source_id, &[id.item_id]);
        if receipt.accepted == 0 {
            return Err(SchedulerError::Busy(id));
        }
        Ok(receipt)
    }

    pub fn snapshot(&self) -> Snapshot {
        let (active, queued, max) = {
            let queue = self.inner.queue();
            (queue.active(), queue.queued(), queue.cap())
        };
        let tasks = self.inner.registry.snapshot();
        let complete = registry::is_complete(&tasks);
        Snapshot {
            tasks,
            active,
            queued,
            max,
            complete,
        }
    }

    /// Snapshots every `progress_interval_ms`, ending after the first
    /// complete one.
    pub fn stream_progress(&self) -> impl Stream<Item = Snapshot> + Send + 'static {
        let sched = self.clone();
        progress::poll_stream(self.inner.settings.progress_interval, move || {
            sched.snapshot()
        })
    }

    /// Removes terminal records; `None` clears all of them.
    pub fn clear(&self, ids: Option<&[TaskId]>) -> usize {
        let cleared = self.inner.registry.clear_terminal(ids);
        if cleared > 0 {
            tracing::debug!(cleared, "cleared finished tasks");
        }
        cleared
    }
}
