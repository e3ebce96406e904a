//! `tgdl clear [tasks]` – forget finished tasks.

use anyhow::Result;
use tgdl_core::registry::TaskId;

use crate::cli::control_socket::{send, ControlRequest};

pub async fn run_clear(tasks: &[TaskId]) -> Result<()> {
    let reply = send(&ControlRequest::Clear(tasks.to_vec())).await?;
    println!("{reply}");
    Ok(())
}
