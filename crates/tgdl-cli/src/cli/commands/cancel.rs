//! `tgdl cancel <task>` – stop a task of the running `tgdl get`.

use anyhow::Result;
use tgdl_core::registry::TaskId;

use crate::cli::control_socket::{send, ControlRequest};

pub async fn run_cancel(task: TaskId) -> Result<()> {
    let reply = send(&ControlRequest::Cancel(task)).await?;
    println!("{reply}");
    Ok(())
}
