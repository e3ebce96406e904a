//! `tgdl get <source> [items]` – download and follow progress until every
//! task has finished. While it runs, the control socket accepts `tgdl
//! status`, `cancel`, `retry` and `clear`.

use std::pin::pin;

use anyhow::{bail, Result};
use futures::StreamExt;
use tgdl_core::config::TgdlConfig;
use tgdl_core::media::format_size;
use tgdl_core::registry::TaskState;
use tgdl_core::scheduler::{Scheduler, Snapshot};

use super::status::print_tasks;
use crate::cli::{control_socket, find_source, open_session};

#[derive(Debug, Clone)]
pub struct GetOptions {
    pub source: String,
    pub items: Vec<i64>,
    pub limit: usize,
    pub related: bool,
}

/// One progress line: counts plus the combined transfer rate.
pub(crate) fn progress_line(snap: &Snapshot) -> String {
    let finished = snap.tasks.values().filter(|r| r.state.is_terminal()).count();
    let rate: f64 = snap
        .tasks
        .values()
        .filter(|r| r.state == TaskState::Downloading)
        .filter_map(|r| r.transfer_rate)
        .sum();
    format!(
        "  {}/{} finished  {} downloading  {} queued  {}/s",
        finished,
        snap.tasks.len(),
        snap.count(TaskState::Downloading),
        snap.queued,
        format_size(rate as u64)
    )
}

fn cancel_all(sched: &Scheduler) {
    for (id, rec) in sched.snapshot().tasks {
        if !rec.state.is_terminal() {
            let _ = sched.cancel(id);
        }
    }
}

pub async fn run_get(cfg: &TgdlConfig, opts: &GetOptions) -> Result<()> {
    let session = open_session(cfg).await?;
    let sched = session.scheduler.clone();
    let src = find_source(&session, &opts.source).await?;

    let ids = if opts.items.is_empty() {
        let listing = sched
            .catalog()
            .list(src.id, opts.limit, opts.related, false)
            .await?;
        listing.items.iter().map(|i| i.item_id).collect()
    } else {
        opts.items.clone()
    };
    if ids.is_empty() {
        println!("Nothing to download from {}.", src.name);
        session.shutdown();
        return Ok(());
    }

    let socket = tgdl_core::control::default_control_socket_path().ok();
    let listener = socket.as_ref().and_then(|path| {
        match control_socket::spawn_control_listener(sched.clone(), path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket unavailable: {:#}", e);
                None
            }
        }
    });

    let receipt = sched.submit(&src.name, src.id, &ids);
    println!(
        "{}: {} task(s) accepted, {} active, {} queued (max {})",
        src.name, receipt.accepted, receipt.active, receipt.queued, receipt.max_concurrent
    );

    let mut updates = pin!(sched.stream_progress());
    let mut last = None;
    let mut interrupted = false;
    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some(snap) => {
                    println!("{}", progress_line(&snap));
                    last = Some(snap);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                println!("Interrupted, cancelling remaining tasks...");
                interrupted = true;
                cancel_all(&sched);
            }
        }
    }

    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = &socket {
        let _ = std::fs::remove_file(path);
    }
    session.shutdown();

    let Some(snap) = last else {
        return Ok(());
    };
    print_tasks(&snap);
    let failed = snap.count(TaskState::Error);
    if failed > 0 {
        bail!("{failed} task(s) failed");
    }
    Ok(())
}
