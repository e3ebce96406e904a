//! Executor: runs one admitted batch to completion, task by task.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use super::Shared;
use crate::control::TransferControl;
use crate::error::TaskError;
use crate::link::refine;
use crate::registry::{Outcome, QueueEntry, TaskId};
use crate::storage;

/// Runs every entry of the batch. Entries share one source label, so they
/// share one folder.
pub(super) async fn run_batch(shared: &Arc<Shared>, batch: &[QueueEntry]) {
    let Some(first) = batch.first() else {
        return;
    };
    let dir = storage::label_dir(&shared.settings.download_root, &first.source_label);
    if let Err(e) = storage::prepare_dir(&dir).await {
        let msg = TaskError::io("create folder", &dir, e).to_string();
        tracing::error!(folder = %dir.display(), "batch abandoned: {}", msg);
        for entry in batch {
            shared
                .registry
                .finish(&entry.task_id, Outcome::Failed(msg.clone()));
        }
        return;
    }

    for entry in batch {
        let id = entry.task_id;
        let run = AssertUnwindSafe(run_task(shared, id, &dir)).catch_unwind();
        if run.await.is_err() {
            shared.cancels.unregister(&id);
            tracing::error!(task = %id, "executor panicked");
            shared
                .registry
                .finish(&id, Outcome::Failed("internal error".to_string()));
        }
    }
}

async fn run_task(shared: &Arc<Shared>, id: TaskId, dir: &Path) {
    let registry = &shared.registry;
    if shared.cancels.is_requested(&id) {
        registry.finish(&id, Outcome::Cancelled);
        tracing::info!(task = %id, "cancelled before start");
        return;
    }

    let item = match shared.catalog.resolve(id).await {
        Ok(item) => item,
        Err(e) => {
            let e = refine(e);
            tracing::warn!(task = %id, "resolve failed: {}", e);
            fail(shared, &id, e);
            return;
        }
    };
    let name = item.file_name();
    registry.set_display_name(&id, &name);
    let target = dir.join(&name);

    if storage::already_downloaded(&target, item.size).await {
        registry.finish(&id, Outcome::Skipped { size: item.size });
        tracing::info!(task = %id, file = %target.display(), "already downloaded");
        return;
    }

    if !shared
        .supervisor
        .wait_ready(shared.settings.link_wait)
        .await
    {
        fail(
            shared,
            &id,
            TaskError::Link("link is not connected".to_string()),
        );
        return;
    }
    if !registry.start_download(&id, item.size, Instant::now()) {
        // Force-cancelled while resolving.
        return;
    }

    let token = shared.cancels.register(id);
    let progress = {
        let registry = Arc::clone(&shared.registry);
        let cancels = Arc::clone(&shared.cancels);
        let window = shared.settings.rate_window;
        Box::new(move |transferred: u64, total: u64| {
            let control = cancels.control_for(&id);
            if control == TransferControl::Continue {
                registry.record_progress(&id, transferred, total, Instant::now(), window);
            }
            control
        })
    };
    tracing::info!(task = %id, file = %target.display(), size = item.size, "download started");
    let temp = storage::temp_path(&target);
    let result = shared
        .catalog
        .link()
        .fetch(item, temp.clone(), progress, token)
        .await;
    shared.cancels.unregister(&id);

    match result {
        Ok(_) => match storage::finalize(&temp, &target).await {
            Ok(size) => {
                registry.finish(&id, Outcome::Done { size });
                tracing::info!(task = %id, size, "download finished");
            }
            Err(e) => {
                storage::remove_partial(&temp).await;
                fail(shared, &id, TaskError::io("finalize", &target, e));
            }
        },
        Err(e) => {
            let e = refine(TaskError::from(e));
            if e.is_cancelled() || shared.cancels.is_requested(&id) {
                storage::remove_partial(&temp).await;
                registry.finish(&id, Outcome::Cancelled);
                tracing::info!(task = %id, "download cancelled");
                return;
            }
            storage::remove_partial(&temp).await;
            tracing::warn!(task = %id, "download failed: {}", e);
            fail(shared, &id, e);
        }
    }
}

/// Records the failure; link trouble also wakes the supervisor.
fn fail(shared: &Arc<Shared>, id: &TaskId, err: TaskError) {
    if err.is_transient() {
        shared.supervisor.report_lost();
    }
    shared.registry.finish(id, Outcome::Failed(err.to_string()));
}
