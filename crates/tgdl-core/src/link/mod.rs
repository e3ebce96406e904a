//! Link to the remote messaging service.
//!
//! The scheduler never touches a client directly. One worker task owns the
//! [`MediaClient`] and serves typed requests sent through a [`LinkHandle`];
//! callers await each reply with a timeout. A [`LinkSupervisor`] tracks
//! connectivity and drives reconnects with backoff.

mod actor;
mod backoff;
mod classify;
mod dir;
mod supervisor;

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::control::TransferControl;
use crate::error::TaskError;
use crate::media::{ItemDescriptor, SourceInfo};

pub use actor::{spawn_link, LinkHandle};
pub use backoff::ReconnectPolicy;
pub use classify::{classify_message, refine, FailureKind};
pub use dir::DirectorySource;
pub use supervisor::{LinkState, LinkSupervisor};

/// Progress callback handed to [`MediaClient::fetch`]:
/// `(bytes_transferred, bytes_total) -> continue or abort`.
pub type ProgressFn<'a> = dyn FnMut(u64, u64) -> TransferControl + Send + 'a;

/// Capability the scheduler needs from a remote media client. Implemented by
/// the network client and by [`DirectorySource`].
#[async_trait]
pub trait MediaClient: Send + Sync + 'static {
    /// Open the session.
    async fn connect(&self) -> Result<(), TaskError>;

    async fn is_authorized(&self) -> bool;

    async fn is_connected(&self) -> bool;

    async fn reconnect(&self) -> Result<(), TaskError>;

    /// Most recent conversations, newest first.
    async fn list_sources(&self, limit: usize) -> Result<Vec<SourceInfo>, TaskError>;

    /// Look a source up by username, link or title.
    async fn find_source(&self, query: &str) -> Result<Option<SourceInfo>, TaskError>;

    async fn resolve_item(
        &self,
        source_id: i64,
        item_id: i64,
    ) -> Result<Option<ItemDescriptor>, TaskError>;

    /// Media items among the last `limit` messages, newest first. With
    /// `include_related`, items posted in comment threads follow their parent.
    async fn list_items(
        &self,
        source_id: i64,
        limit: usize,
        include_related: bool,
    ) -> Result<Vec<ItemDescriptor>, TaskError>;

    /// Write the item's bytes to `dest`. `on_progress` may be called any
    /// number of times; returning [`TransferControl::Abort`] or cancelling
    /// `cancel` must stop the transfer with [`TaskError::Cancelled`].
    async fn fetch(
        &self,
        item: &ItemDescriptor,
        dest: &Path,
        on_progress: &mut ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, TaskError>;

    async fn fetch_thumbnail(&self, item: &ItemDescriptor) -> Result<Option<Vec<u8>>, TaskError>;
}
