//! Wires a client into a running scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::cache::ThumbnailCache;
use crate::catalog::Catalog;
use crate::config::TgdlConfig;
use crate::error::LinkError;
use crate::link::{spawn_link, LinkSupervisor, MediaClient, ReconnectPolicy};
use crate::scheduler::Scheduler;

/// Everything a front end needs: the scheduler plus the link's supervisor.
pub struct Session {
    pub scheduler: Scheduler,
    pub supervisor: Arc<LinkSupervisor>,
    worker: JoinHandle<()>,
    pump: JoinHandle<()>,
    watch: JoinHandle<()>,
}

impl Session {
    /// Connects `client`, starts the link worker, the link check and the
    /// queue pump.
    ///
    /// Fails with [`LinkError::Unauthorized`] when the client has no session.
    pub async fn start(
        client: Box<dyn MediaClient>,
        cfg: &TgdlConfig,
        thumbnail_dir: PathBuf,
    ) -> Result<Self, LinkError> {
        let (link, worker) = spawn_link(client, cfg).await?;
        let supervisor = LinkSupervisor::new(
            link.clone(),
            ReconnectPolicy::from_config(&cfg.reconnect()),
        );
        let catalog = Arc::new(Catalog::new(link, cfg, ThumbnailCache::new(thumbnail_dir)));
        let scheduler = Scheduler::new(catalog, Arc::clone(&supervisor), cfg);
        let pump = scheduler.spawn_queue_pump();
        let watch = supervisor.spawn_watch(cfg.link_check_interval());
        tracing::info!(
            max_concurrent = cfg.max_concurrent(),
            root = %cfg.download_root().display(),
            "session started"
        );
        Ok(Self {
            scheduler,
            supervisor,
            worker,
            pump,
            watch,
        })
    }

    /// Stops the pump, the link check and the link worker; in-flight
    /// transfers are dropped.
    pub fn shutdown(self) {
        self.pump.abort();
        self.watch.abort();
        self.worker.abort();
        tracing::info!("session stopped");
    }
}
