//! `tgdl status` – show tasks of the running `tgdl get`.

use anyhow::Result;
use tgdl_core::media::format_size;
use tgdl_core::registry::{StatusRecord, TaskState};
use tgdl_core::scheduler::Snapshot;

use crate::cli::control_socket::fetch_snapshot;

pub async fn run_status(json: bool) -> Result<()> {
    let snap = fetch_snapshot().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        print_tasks(&snap);
    }
    Ok(())
}

/// `queued 2/5`, `42% 1.5MB/s`, or the error text.
pub(crate) fn detail(rec: &StatusRecord) -> String {
    match rec.state {
        TaskState::Queued => match (rec.queue_position, rec.queue_size) {
            (Some(pos), Some(size)) => format!("#{pos} of {size}"),
            _ => String::new(),
        },
        TaskState::Downloading => {
            let rate = rec
                .transfer_rate
                .map(|r| format!(" {}/s", format_size(r as u64)))
                .unwrap_or_default();
            format!(
                "{}% of {}{}",
                rec.progress_percent,
                format_size(rec.bytes_total),
                rate
            )
        }
        TaskState::Done | TaskState::Skipped => format_size(rec.bytes_total),
        TaskState::Error | TaskState::Cancelled => {
            rec.error_message.clone().unwrap_or_default()
        }
        TaskState::Waiting => String::new(),
    }
}

pub(crate) fn print_tasks(snap: &Snapshot) {
    if snap.tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    println!("{:<24} {:<12} {:<32} {}", "TASK", "STATE", "DETAIL", "NAME");
    for (id, rec) in &snap.tasks {
        println!(
            "{:<24} {:<12} {:<32} {}",
            id.to_string(),
            rec.state.as_str(),
            detail(rec),
            rec.display_name
        );
    }
    println!(
        "{} active, {} queued (max {}){}",
        snap.active,
        snap.queued,
        snap.max,
        if snap.complete { ", all finished" } else { "" }
    );
}
