//! Shared helpers: an in-memory `MediaClient` with gated transfers, and
//! polling utilities for scheduler snapshots.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tgdl_core::config::TgdlConfig;
use tgdl_core::control::TransferControl;
use tgdl_core::error::TaskError;
use tgdl_core::link::{MediaClient, ProgressFn};
use tgdl_core::media::{ItemDescriptor, ItemOrigin, SourceInfo, SourceKind};
use tgdl_core::registry::TaskId;
use tgdl_core::scheduler::{Scheduler, Snapshot};
use tgdl_core::session::Session;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub const SOURCE_ID: i64 = -1001;
pub const LABEL: &str = "Test Channel";
pub const BODY_LEN: usize = 1000;

/// Observations shared between a test and its `FakeClient`.
pub struct Monitor {
    pub fetches: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub reconnects: AtomicUsize,
    gate: Semaphore,
    failures: Mutex<HashMap<i64, String>>,
}

impl Monitor {
    fn new() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            reconnects: AtomicUsize::new(0),
            gate: Semaphore::new(0),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Lets `n` gated transfers finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// The next fetches of `item_id` fail with `msg`.
    pub fn fail_item(&self, item_id: i64, msg: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(item_id, msg.to_string());
    }

    pub fn heal_item(&self, item_id: i64) {
        self.failures.lock().unwrap().remove(&item_id);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<Monitor>);

impl InFlight {
    fn enter(monitor: &Arc<Monitor>) -> Self {
        let now = monitor.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        monitor.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(Arc::clone(monitor))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn body(item_id: i64) -> Vec<u8> {
    (0..BODY_LEN).map(|i| (i as i64 + item_id) as u8).collect()
}

pub fn descriptor(item_id: i64) -> ItemDescriptor {
    ItemDescriptor {
        source_id: SOURCE_ID,
        item_id,
        filename: Some(format!("clip_{item_id}.mp4")),
        size: BODY_LEN as u64,
        duration_secs: 12,
        has_thumbnail: false,
        date: None,
        origin: ItemOrigin::Main,
    }
}

pub struct FakeClient {
    items: HashMap<i64, ItemDescriptor>,
    monitor: Arc<Monitor>,
    gated: bool,
    authorized: bool,
    connected: AtomicBool,
}

impl FakeClient {
    /// Items `1..=count` in `SOURCE_ID`. Gated transfers stop halfway until
    /// the monitor releases them.
    pub fn new(count: i64, gated: bool) -> (Self, Arc<Monitor>) {
        let monitor = Arc::new(Monitor::new());
        let client = Self {
            items: (1..=count).map(|i| (i, descriptor(i))).collect(),
            monitor: Arc::clone(&monitor),
            gated,
            authorized: true,
            connected: AtomicBool::new(false),
        };
        (client, monitor)
    }

    pub fn unauthorized(mut self) -> Self {
        self.authorized = false;
        self
    }
}

#[async_trait]
impl MediaClient for FakeClient {
    async fn connect(&self) -> Result<(), TaskError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_authorized(&self) -> bool {
        self.authorized
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), TaskError> {
        self.monitor.reconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn list_sources(&self, _limit: usize) -> Result<Vec<SourceInfo>, TaskError> {
        Ok(vec![SourceInfo {
            id: SOURCE_ID,
            name: LABEL.to_string(),
            kind: SourceKind::Channel,
        }])
    }

    async fn find_source(&self, query: &str) -> Result<Option<SourceInfo>, TaskError> {
        Ok(self
            .list_sources(1)
            .await?
            .into_iter()
            .find(|s| s.name == query))
    }

    async fn resolve_item(
        &self,
        source_id: i64,
        item_id: i64,
    ) -> Result<Option<ItemDescriptor>, TaskError> {
        if source_id != SOURCE_ID {
            return Ok(None);
        }
        Ok(self.items.get(&item_id).cloned())
    }

    async fn list_items(
        &self,
        source_id: i64,
        limit: usize,
        _include_related: bool,
    ) -> Result<Vec<ItemDescriptor>, TaskError> {
        if source_id != SOURCE_ID {
            return Err(TaskError::NotFound(format!("source {source_id}")));
        }
        let mut items: Vec<_> = self.items.values().cloned().collect();
        items.sort_by_key(|i| std::cmp::Reverse(i.item_id));
        items.truncate(limit);
        Ok(items)
    }

    async fn fetch(
        &self,
        item: &ItemDescriptor,
        dest: &Path,
        on_progress: &mut ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, TaskError> {
        self.monitor.fetches.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.monitor);
        let failure = self
            .monitor
            .failures
            .lock()
            .unwrap()
            .get(&item.item_id)
            .cloned();
        if let Some(msg) = failure {
            return Err(TaskError::Remote(msg));
        }

        let data = body(item.item_id);
        let total = data.len() as u64;
        let half = data.len() / 2;
        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TaskError::io("create", dest, e))?;
        out.write_all(&data[..half])
            .await
            .map_err(|e| TaskError::io("write", dest, e))?;
        out.flush().await.map_err(|e| TaskError::io("flush", dest, e))?;
        if on_progress(half as u64, total) == TransferControl::Abort {
            return Err(TaskError::Cancelled);
        }

        if self.gated {
            tokio::select! {
                permit = self.monitor.gate.acquire() => {
                    permit.map_err(|e| TaskError::Remote(e.to_string()))?.forget();
                }
                _ = cancel.cancelled() => return Err(TaskError::Cancelled),
            }
        }

        out.write_all(&data[half..])
            .await
            .map_err(|e| TaskError::io("write", dest, e))?;
        out.flush().await.map_err(|e| TaskError::io("flush", dest, e))?;
        if on_progress(total, total) == TransferControl::Abort {
            return Err(TaskError::Cancelled);
        }
        Ok(total)
    }

    async fn fetch_thumbnail(&self, _item: &ItemDescriptor) -> Result<Option<Vec<u8>>, TaskError> {
        Ok(None)
    }
}

/// Fast timings, everything under `root`.
pub fn config(root: &Path, max_concurrent: usize) -> TgdlConfig {
    TgdlConfig {
        download_dir: Some(root.join("downloads")),
        cache_dir: Some(root.join("cache")),
        max_concurrent,
        dispatch_delay_ms: 0,
        queue_poll_ms: 50,
        progress_interval_ms: 20,
        rate_window_ms: 0,
        data_timeout_secs: 30,
        metadata_timeout_secs: 5,
        ..TgdlConfig::default()
    }
}

pub async fn start(client: FakeClient, cfg: &TgdlConfig) -> Session {
    let thumbs = cfg.thumbnail_dir().unwrap();
    Session::start(Box::new(client), cfg, thumbs)
        .await
        .expect("session starts")
}

pub fn task(item_id: i64) -> TaskId {
    TaskId::new(SOURCE_ID, item_id)
}

/// Polls until `pred` holds; panics after five seconds.
pub async fn wait_until<F>(sched: &Scheduler, what: &str, pred: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snap = sched.snapshot();
        if pred(&snap) {
            return snap;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}: {snap:#?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
