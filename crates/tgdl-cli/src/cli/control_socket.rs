//! Control socket: server (during `tgdl get`) and client (for `tgdl status`,
//! `cancel`, `retry`, `clear`).
//!
//! Protocol: one request line, one reply line. Requests are
//! `cancel <task>`, `retry <task>`, `clear [<task>...]` and `snapshot`.
//! Replies start with `ok` or `error:`; `snapshot` answers with JSON.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tgdl_core::registry::TaskId;
use tgdl_core::scheduler::{Scheduler, Snapshot};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Cancel(TaskId),
    Retry(TaskId),
    Clear(Vec<TaskId>),
    Snapshot,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        match verb {
            "cancel" | "retry" => {
                let id = words.next()?.parse().ok()?;
                if words.next().is_some() {
                    return None;
                }
                Some(if verb == "cancel" {
                    ControlRequest::Cancel(id)
                } else {
                    ControlRequest::Retry(id)
                })
            }
            "clear" => words
                .map(|w| w.parse().ok())
                .collect::<Option<Vec<TaskId>>>()
                .map(ControlRequest::Clear),
            "snapshot" if words.next().is_none() => Some(ControlRequest::Snapshot),
            _ => None,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            ControlRequest::Cancel(id) => format!("cancel {id}\n"),
            ControlRequest::Retry(id) => format!("retry {id}\n"),
            ControlRequest::Clear(ids) => {
                let mut line = String::from("clear");
                for id in ids {
                    line.push(' ');
                    line.push_str(&id.to_string());
                }
                line.push('\n');
                line
            }
            ControlRequest::Snapshot => "snapshot\n".to_string(),
        }
    }
}

async fn answer(sched: &Scheduler, req: ControlRequest) -> String {
    match req {
        ControlRequest::Cancel(id) => match sched.cancel(id) {
            Ok(()) => format!("ok cancelled {id}"),
            Err(e) => format!("error: {e}"),
        },
        ControlRequest::Retry(id) => match sched.retry(id).await {
            Ok(r) => format!(
                "ok retrying {id} ({} active, {} queued)",
                r.active, r.queued
            ),
            Err(e) => format!("error: {e}"),
        },
        ControlRequest::Clear(ids) => {
            let ids = (!ids.is_empty()).then_some(ids.as_slice());
            format!("ok cleared {}", sched.clear(ids))
        }
        ControlRequest::Snapshot => match serde_json::to_string(&sched.snapshot()) {
            Ok(json) => json,
            Err(e) => format!("error: {e}"),
        },
    }
}

/// Spawns a task that listens on `path` and answers requests against
/// `sched`. Malformed lines get an error reply.
pub fn spawn_control_listener(
    sched: Scheduler,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let sched = sched.clone();
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let reply = match ControlRequest::parse(&line) {
                                Some(req) => answer(&sched, req).await,
                                None => format!("error: unknown request {:?}", line.trim()),
                            };
                            if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

fn socket_path() -> Result<PathBuf> {
    Ok(tgdl_core::control::default_control_socket_path()?)
}

/// Sends one request and returns the reply line.
pub async fn request(socket_path: &Path, req: &ControlRequest) -> Result<String> {
    if !socket_path.exists() {
        bail!("no running `tgdl get` (socket {} missing)", socket_path.display());
    }
    let stream = UnixStream::connect(socket_path).await?;
    let (read, mut write) = stream.into_split();
    write.write_all(req.to_line().as_bytes()).await?;
    let reply = BufReader::new(read).lines().next_line().await?;
    match reply {
        Some(line) => Ok(line),
        None => bail!("control socket closed without a reply"),
    }
}

/// Request against the default socket; an `error:` reply becomes an error.
pub async fn send(req: &ControlRequest) -> Result<String> {
    let reply = request(&socket_path()?, req).await?;
    if let Some(msg) = reply.strip_prefix("error: ") {
        bail!("{msg}");
    }
    Ok(reply)
}

pub async fn fetch_snapshot() -> Result<Snapshot> {
    let reply = send(&ControlRequest::Snapshot).await?;
    Ok(serde_json::from_str(&reply)?)
}
