//! `tgdl retry <task>` – run a finished task again.

use anyhow::Result;
use tgdl_core::registry::TaskId;

use crate::cli::control_socket::{send, ControlRequest};

pub async fn run_retry(task: TaskId) -> Result<()> {
    let reply = send(&ControlRequest::Retry(task)).await?;
    println!("{reply}");
    Ok(())
}
