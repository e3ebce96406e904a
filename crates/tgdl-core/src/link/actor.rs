//! Worker task owning the client, and the handle used to reach it.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::MediaClient;
use crate::config::TgdlConfig;
use crate::control::TransferControl;
use crate::error::{LinkError, TaskError};
use crate::media::{ItemDescriptor, SourceInfo};

type Reply<T> = oneshot::Sender<Result<T, TaskError>>;
type BoxProgress = Box<dyn FnMut(u64, u64) -> TransferControl + Send>;

enum LinkRequest {
    IsConnected {
        reply: oneshot::Sender<bool>,
    },
    Reconnect {
        reply: Reply<()>,
    },
    ListSources {
        limit: usize,
        reply: Reply<Vec<SourceInfo>>,
    },
    FindSource {
        query: String,
        reply: Reply<Option<SourceInfo>>,
    },
    Resolve {
        source_id: i64,
        item_id: i64,
        reply: Reply<Option<ItemDescriptor>>,
    },
    ListItems {
        source_id: i64,
        limit: usize,
        include_related: bool,
        reply: Reply<Vec<ItemDescriptor>>,
    },
    Fetch {
        item: ItemDescriptor,
        dest: PathBuf,
        progress: BoxProgress,
        cancel: CancellationToken,
        reply: Reply<u64>,
    },
    Thumbnail {
        item: ItemDescriptor,
        reply: Reply<Option<Vec<u8>>>,
    },
}

const REQUEST_BUFFER: usize = 64;

/// Connects the client, checks authorization and starts the worker.
///
/// An unauthorized session is the one fatal condition: nothing can run
/// without it, so the caller is expected to exit.
pub async fn spawn_link(
    client: Box<dyn MediaClient>,
    cfg: &TgdlConfig,
) -> Result<(LinkHandle, JoinHandle<()>), LinkError> {
    client.connect().await?;
    if !client.is_authorized().await {
        return Err(LinkError::Unauthorized(
            "session is not logged in; sign in with the client first".to_string(),
        ));
    }
    let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
    let worker = tokio::spawn(run_worker(client, rx));
    tracing::info!("link worker started");
    Ok((
        LinkHandle {
            tx,
            metadata_timeout: cfg.metadata_timeout(),
            data_timeout: cfg.data_timeout(),
        },
        worker,
    ))
}

/// Serves requests until every handle is dropped. Requests run concurrently
/// on this one task, so the client is never shared with another task.
async fn run_worker(client: Box<dyn MediaClient>, mut rx: mpsc::Receiver<LinkRequest>) {
    let client: &dyn MediaClient = client.as_ref();
    let mut in_flight = FuturesUnordered::new();
    loop {
        tokio::select! {
            req = rx.recv() => match req {
                Some(req) => in_flight.push(serve(client, req)),
                None => break,
            },
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
        }
    }
    while in_flight.next().await.is_some() {}
    tracing::info!("link worker stopped");
}

fn serve<'a>(
    client: &'a dyn MediaClient,
    req: LinkRequest,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        match req {
            LinkRequest::IsConnected { reply } => {
                let _ = reply.send(client.is_connected().await);
            }
            LinkRequest::Reconnect { reply } => {
                let _ = reply.send(client.reconnect().await);
            }
            LinkRequest::ListSources { limit, reply } => {
                let _ = reply.send(client.list_sources(limit).await);
            }
            LinkRequest::FindSource { query, reply } => {
                let _ = reply.send(client.find_source(&query).await);
            }
            LinkRequest::Resolve {
                source_id,
                item_id,
                reply,
            } => {
                let _ = reply.send(client.resolve_item(source_id, item_id).await);
            }
            LinkRequest::ListItems {
                source_id,
                limit,
                include_related,
                reply,
            } => {
                let _ = reply.send(client.list_items(source_id, limit, include_related).await);
            }
            LinkRequest::Fetch {
                item,
                dest,
                mut progress,
                cancel,
                reply,
            } => {
                let result = tokio::select! {
                    r = client.fetch(&item, &dest, &mut *progress, &cancel) => r,
                    _ = cancel.cancelled() => Err(TaskError::Cancelled),
                };
                let _ = reply.send(result);
            }
            LinkRequest::Thumbnail { item, reply } => {
                let _ = reply.send(client.fetch_thumbnail(&item).await);
            }
        }
    })
}

/// Cheap, cloneable entry point to the link worker.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkRequest>,
    metadata_timeout: Duration,
    data_timeout: Duration,
}

impl LinkHandle {
    async fn call<T>(
        &self,
        timeout: Duration,
        build: impl FnOnce(oneshot::Sender<T>) -> LinkRequest,
    ) -> Result<T, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| LinkError::Closed)?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(_)) => Err(LinkError::Closed),
            Err(_) => Err(LinkError::Timeout(timeout)),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.call(self.metadata_timeout, |reply| LinkRequest::IsConnected { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn reconnect(&self) -> Result<(), LinkError> {
        Ok(self
            .call(self.metadata_timeout, |reply| LinkRequest::Reconnect { reply })
            .await??)
    }

    pub async fn list_sources(&self, limit: usize) -> Result<Vec<SourceInfo>, LinkError> {
        Ok(self
            .call(self.metadata_timeout, |reply| LinkRequest::ListSources {
                limit,
                reply,
            })
            .await??)
    }

    pub async fn find_source(&self, query: &str) -> Result<Option<SourceInfo>, LinkError> {
        let query = query.to_string();
        Ok(self
            .call(self.metadata_timeout, |reply| LinkRequest::FindSource {
                query,
                reply,
            })
            .await??)
    }

    pub async fn resolve_item(
        &self,
        source_id: i64,
        item_id: i64,
    ) -> Result<Option<ItemDescriptor>, LinkError> {
        Ok(self
            .call(self.metadata_timeout, |reply| LinkRequest::Resolve {
                source_id,
                item_id,
                reply,
            })
            .await??)
    }

    /// Listings walk many messages, so they get the data budget.
    pub async fn list_items(
        &self,
        source_id: i64,
        limit: usize,
        include_related: bool,
    ) -> Result<Vec<ItemDescriptor>, LinkError> {
        Ok(self
            .call(self.data_timeout, |reply| LinkRequest::ListItems {
                source_id,
                limit,
                include_related,
                reply,
            })
            .await??)
    }

    /// Transfers one item. On timeout `cancel` is fired so the worker drops
    /// the stuck transfer.
    pub async fn fetch(
        &self,
        item: ItemDescriptor,
        dest: PathBuf,
        progress: BoxProgress,
        cancel: CancellationToken,
    ) -> Result<u64, LinkError> {
        let token = cancel.clone();
        let result = self
            .call(self.data_timeout, |reply| LinkRequest::Fetch {
                item,
                dest,
                progress,
                cancel,
                reply,
            })
            .await;
        if matches!(result, Err(LinkError::Timeout(_))) {
            token.cancel();
        }
        Ok(result??)
    }

    pub async fn fetch_thumbnail(
        &self,
        item: ItemDescriptor,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        Ok(self
            .call(self.metadata_timeout, |reply| LinkRequest::Thumbnail {
                item,
                reply,
            })
            .await??)
    }
}
