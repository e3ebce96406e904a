//! Connectivity state machine: `Disconnected → Connecting → Connected`.
//!
//! Executors report link trouble; the supervisor runs at most one reconnect
//! loop at a time, spacing attempts with [`ReconnectPolicy`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{LinkHandle, ReconnectPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Default)]
struct Attempts {
    failures: u32,
    last_attempt: Option<Instant>,
}

pub struct LinkSupervisor {
    link: LinkHandle,
    policy: ReconnectPolicy,
    state: watch::Sender<LinkState>,
    attempts: Mutex<Attempts>,
    reconnecting: AtomicBool,
}

impl LinkSupervisor {
    /// The link is expected to be freshly connected (see `spawn_link`).
    pub fn new(link: LinkHandle, policy: ReconnectPolicy) -> Arc<Self> {
        let (state, _) = watch::channel(LinkState::Connected);
        Arc::new(Self {
            link,
            policy,
            state,
            attempts: Mutex::new(Attempts::default()),
            reconnecting: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Consecutive failed reconnect attempts.
    pub fn failures(&self) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures
    }

    /// Waits up to `limit` for the link to be connected.
    pub async fn wait_ready(&self, limit: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let ready = matches!(
            tokio::time::timeout(limit, rx.wait_for(|s| *s == LinkState::Connected)).await,
            Ok(Ok(_))
        );
        ready
    }

    /// Record that a transfer failed because of the link and start
    /// reconnecting unless a reconnect loop is already running.
    pub fn report_lost(self: &Arc<Self>) {
        self.state.send_replace(LinkState::Disconnected);
        self.start_loop();
    }

    /// Asks the client whether it is still connected; reports a loss if not.
    pub async fn probe(self: &Arc<Self>) -> bool {
        if self.state() == LinkState::Connecting {
            return false;
        }
        let connected = self.link.is_connected().await;
        if !connected {
            self.report_lost();
        }
        connected
    }

    /// Background task that probes the client every `every` while the link
    /// is believed connected, so a silently dropped session is noticed
    /// before the next transfer hits it.
    pub fn spawn_watch(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let sup = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tick.tick().await;
            loop {
                tick.tick().await;
                if sup.is_ready() && !sup.probe().await {
                    tracing::warn!("link check failed; reconnecting");
                }
            }
        })
    }

    fn start_loop(self: &Arc<Self>) {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tokio::spawn(Arc::clone(self).reconnect_loop());
        }
    }

    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            while self.state() != LinkState::Connected {
                tokio::time::sleep(self.next_wait()).await;
                self.attempt().await;
            }
            self.reconnecting.store(false, Ordering::Release);
            // A loss reported while we were finishing would otherwise be missed.
            let lost_again = self.state() == LinkState::Disconnected;
            if !lost_again
                || self
                    .reconnecting
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                break;
            }
        }
    }

    /// Backoff for the current failure count, and never less than the floor
    /// since the previous attempt.
    fn next_wait(&self) -> Duration {
        let attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let backoff = self.policy.delay_after(attempts.failures);
        let spacing = attempts
            .last_attempt
            .map(|at| self.policy.base_delay.saturating_sub(at.elapsed()))
            .unwrap_or(Duration::ZERO);
        backoff.max(spacing)
    }

    async fn attempt(&self) {
        self.state.send_replace(LinkState::Connecting);
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_attempt = Some(Instant::now());

        let result = self.link.reconnect().await;
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => {
                attempts.failures = 0;
                // A loss reported during the attempt wins over its success.
                let published = self.state.send_if_modified(|s| {
                    if *s == LinkState::Connecting {
                        *s = LinkState::Connected;
                        true
                    } else {
                        false
                    }
                });
                if published {
                    tracing::info!("link reconnected");
                } else {
                    tracing::debug!("link lost again while reconnecting");
                }
            }
            Err(e) => {
                attempts.failures = attempts.failures.saturating_add(1);
                self.state.send_replace(LinkState::Disconnected);
                tracing::warn!(
                    failures = attempts.failures,
                    "reconnect failed: {}; next attempt in {:?}",
                    e,
                    self.policy.delay_after(attempts.failures)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::TgdlConfig;
    use crate::error::TaskError;
    use crate::link::{spawn_link, MediaClient, ProgressFn};
    use crate::media::{ItemDescriptor, SourceInfo};

    struct Flaky {
        reconnects: Arc<AtomicU32>,
        heal: bool,
        gate: Option<Arc<Semaphore>>,
    }

    #[async_trait]
    impl MediaClient for Flaky {
        async fn connect(&self) -> Result<(), TaskError> {
            Ok(())
        }
        async fn is_authorized(&self) -> bool {
            true
        }
        async fn is_connected(&self) -> bool {
            false
        }
        async fn reconnect(&self) -> Result<(), TaskError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            if self.heal {
                Ok(())
            } else {
                Err(TaskError::Link("proxy refused".into()))
            }
        }
        async fn list_sources(&self, _: usize) -> Result<Vec<SourceInfo>, TaskError> {
            Ok(Vec::new())
        }
        async fn find_source(&self, _: &str) -> Result<Option<SourceInfo>, TaskError> {
            Ok(None)
        }
        async fn resolve_item(&self, _: i64, _: i64) -> Result<Option<ItemDescriptor>, TaskError> {
            Ok(None)
        }
        async fn list_items(
            &self,
            _: i64,
            _: usize,
            _: bool,
        ) -> Result<Vec<ItemDescriptor>, TaskError> {
            Ok(Vec::new())
        }
        async fn fetch(
            &self,
            _: &ItemDescriptor,
            _: &Path,
            _: &mut ProgressFn<'_>,
            _: &CancellationToken,
        ) -> Result<u64, TaskError> {
            Err(TaskError::Link("offline".into()))
        }
        async fn fetch_thumbnail(&self, _: &ItemDescriptor) -> Result<Option<Vec<u8>>, TaskError> {
            Ok(None)
        }
    }

    async fn supervisor_with(
        heal: bool,
        gate: Option<Arc<Semaphore>>,
    ) -> (Arc<LinkSupervisor>, Arc<AtomicU32>) {
        let reconnects = Arc::new(AtomicU32::new(0));
        let client = Flaky {
            reconnects: Arc::clone(&reconnects),
            heal,
            gate,
        };
        let (link, _worker) = spawn_link(Box::new(client), &TgdlConfig::default())
            .await
            .unwrap();
        (LinkSupervisor::new(link, ReconnectPolicy::default()), reconnects)
    }

    async fn supervisor(heal: bool) -> (Arc<LinkSupervisor>, Arc<AtomicU32>) {
        supervisor_with(heal, None).await
    }

    async fn wait_for_reconnects(reconnects: &AtomicU32, n: u32) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while reconnects.load(Ordering::SeqCst) < n && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reconnects.load(Ordering::SeqCst) >= n, "no reconnect attempt");
    }

    #[tokio::test]
    async fn loss_reconnects_once() {
        let (sup, reconnects) = supervisor(true).await;
        assert!(sup.is_ready());
        sup.report_lost();
        sup.report_lost();
        assert!(!sup.is_ready());
        assert!(sup.wait_ready(Duration::from_secs(2)).await);
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);
        assert_eq!(sup.failures(), 0);
    }

    #[tokio::test]
    async fn failed_attempt_backs_off() {
        let (sup, reconnects) = supervisor(false).await;
        sup.report_lost();
        let deadline = Instant::now() + Duration::from_secs(2);
        while sup.failures() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sup.failures(), 1);
        assert_eq!(sup.state(), LinkState::Disconnected);
        // Next attempt is at least 8s away.
        assert!(!sup.wait_ready(Duration::from_millis(200)).await);
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_reports_dead_link() {
        let (sup, _) = supervisor(true).await;
        assert!(!sup.probe().await);
        assert!(sup.wait_ready(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn loss_during_attempt_is_kept() {
        let gate = Arc::new(Semaphore::new(0));
        let (sup, reconnects) = supervisor_with(true, Some(Arc::clone(&gate))).await;
        sup.report_lost();
        wait_for_reconnects(&reconnects, 1).await;
        assert_eq!(sup.state(), LinkState::Connecting);

        sup.report_lost();
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sup.state(), LinkState::Disconnected);
        // The follow-up attempt honours the 8s spacing.
        assert!(!sup.wait_ready(Duration::from_millis(200)).await);
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn watch_notices_dead_session() {
        let (sup, reconnects) = supervisor(true).await;
        let watch = sup.spawn_watch(Duration::from_millis(30));
        wait_for_reconnects(&reconnects, 1).await;
        assert!(sup.wait_ready(Duration::from_secs(2)).await);
        watch.abort();
    }
}
