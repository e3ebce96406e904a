//! A [`MediaClient`] backed by a local directory tree.
//!
//! Layout under the root:
//!
//! - each subdirectory is a source (channel);
//! - each regular file in it is a media item;
//! - `<file>.replies/` holds the items posted in that file's comment thread;
//! - `<file>.thumb.jpg` is the item's thumbnail.
//!
//! Ids are stable hashes of the names, so they survive restarts.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::{MediaClient, ProgressFn};
use crate::control::TransferControl;
use crate::error::TaskError;
use crate::media::{ItemDescriptor, ItemOrigin, SourceInfo, SourceKind};
use crate::storage::TEMP_SUFFIX;

const REPLIES_SUFFIX: &str = ".replies";
const THUMB_SUFFIX: &str = ".thumb.jpg";
const CHUNK_SIZE: usize = 64 * 1024;

/// FNV-1a over the name, folded into a positive i64.
pub(crate) fn stable_id(name: &str) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in name.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    ((hash & i64::MAX as u64) as i64).max(1)
}

fn remote_err(e: io::Error) -> TaskError {
    match e.kind() {
        io::ErrorKind::NotFound => TaskError::NotFound(e.to_string()),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => TaskError::Link(e.to_string()),
        _ => TaskError::Remote(e.to_string()),
    }
}

fn is_item_name(name: &str) -> bool {
    !name.starts_with('.') && !name.ends_with(TEMP_SUFFIX) && !name.ends_with(THUMB_SUFFIX)
}

/// Sources (`want_dirs`) or media files directly inside `dir`, newest first.
async fn entries_newest_first(
    dir: &Path,
    want_dirs: bool,
) -> Result<Vec<(String, PathBuf, std::fs::Metadata)>, TaskError> {
    let mut rd = tokio::fs::read_dir(dir).await.map_err(remote_err)?;
    let mut out = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(remote_err)? {
        let meta = entry.metadata().await.map_err(remote_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let keep = if want_dirs {
            meta.is_dir() && !name.starts_with('.') && !name.ends_with(REPLIES_SUFFIX)
        } else {
            meta.is_file() && is_item_name(&name)
        };
        if keep {
            out.push((name, entry.path(), meta));
        }
    }
    out.sort_by(|a, b| {
        let ta = a.2.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let tb = b.2.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        tb.cmp(&ta).then_with(|| a.0.cmp(&b.0))
    });
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    related_limit: usize,
    chunk_delay: Option<Duration>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            related_limit: 200,
            chunk_delay: None,
        }
    }

    /// Maximum items read from one comment thread.
    pub fn with_related_limit(mut self, limit: usize) -> Self {
        self.related_limit = limit;
        self
    }

    /// Sleep between chunks, to simulate a slow link.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    async fn sources(&self) -> Result<Vec<SourceInfo>, TaskError> {
        Ok(entries_newest_first(&self.root, true)
            .await?
            .into_iter()
            .map(|(name, _, _)| SourceInfo {
                id: stable_id(&name),
                name,
                kind: SourceKind::Channel,
            })
            .collect())
    }

    async fn source_dir(&self, source_id: i64) -> Result<PathBuf, TaskError> {
        self.sources()
            .await?
            .into_iter()
            .find(|s| s.id == source_id)
            .map(|s| self.root.join(s.name))
            .ok_or_else(|| TaskError::NotFound(format!("source {source_id}")))
    }

    fn describe(
        &self,
        source_id: i64,
        name: &str,
        path: &Path,
        meta: &std::fs::Metadata,
        origin: ItemOrigin,
    ) -> ItemDescriptor {
        let mut thumb = path.as_os_str().to_owned();
        thumb.push(THUMB_SUFFIX);
        ItemDescriptor {
            source_id,
            item_id: stable_id(name),
            filename: Some(name.to_string()),
            size: meta.len(),
            duration_secs: 0,
            has_thumbnail: Path::new(&thumb).is_file(),
            date: None,
            origin,
        }
    }

    async fn replies(
        &self,
        source_id: i64,
        parent: &ItemDescriptor,
        parent_path: &Path,
    ) -> Result<Vec<(ItemDescriptor, PathBuf)>, TaskError> {
        let mut dir = parent_path.as_os_str().to_owned();
        dir.push(REPLIES_SUFFIX);
        let dir = PathBuf::from(dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let origin = ItemOrigin::Reply {
            parent_id: parent.item_id,
        };
        Ok(entries_newest_first(&dir, false)
            .await?
            .into_iter()
            .take(self.related_limit)
            .map(|(name, path, meta)| (self.describe(source_id, &name, &path, &meta, origin), path))
            .collect())
    }

    /// Items with their on-disk paths.
    async fn scan(
        &self,
        source_id: i64,
        limit: usize,
        include_related: bool,
    ) -> Result<Vec<(ItemDescriptor, PathBuf)>, TaskError> {
        let dir = self.source_dir(source_id).await?;
        let mut out = Vec::new();
        for (name, path, meta) in entries_newest_first(&dir, false).await?.into_iter().take(limit) {
            let item = self.describe(source_id, &name, &path, &meta, ItemOrigin::Main);
            let replies = if include_related {
                match self.replies(source_id, &item, &path).await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::debug!(item = item.item_id, "skipping unreadable thread: {}", e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };
            out.push((item, path));
            out.extend(replies);
        }
        Ok(out)
    }

    async fn locate(&self, source_id: i64, item_id: i64) -> Result<Option<(ItemDescriptor, PathBuf)>, TaskError> {
        Ok(self
            .scan(source_id, usize::MAX, true)
            .await?
            .into_iter()
            .find(|(item, _)| item.item_id == item_id))
    }
}

#[async_trait]
impl MediaClient for DirectorySource {
    async fn connect(&self) -> Result<(), TaskError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(TaskError::Link(format!(
                "source root {} is not a directory",
                self.root.display()
            )))
        }
    }

    async fn is_authorized(&self) -> bool {
        self.root.is_dir()
    }

    async fn is_connected(&self) -> bool {
        self.root.is_dir()
    }

    async fn reconnect(&self) -> Result<(), TaskError> {
        self.connect().await
    }

    async fn list_sources(&self, limit: usize) -> Result<Vec<SourceInfo>, TaskError> {
        let mut sources = self.sources().await?;
        sources.truncate(limit);
        Ok(sources)
    }

    async fn find_source(&self, query: &str) -> Result<Option<SourceInfo>, TaskError> {
        let query = query.trim().trim_start_matches('@');
        Ok(self
            .sources()
            .await?
            .into_iter()
            .find(|s| s.name == query || s.id.to_string() == query))
    }

    async fn resolve_item(
        &self,
        source_id: i64,
        item_id: i64,
    ) -> Result<Option<ItemDescriptor>, TaskError> {
        match self.locate(source_id, item_id).await {
            Ok(found) => Ok(found.map(|(item, _)| item)),
            Err(TaskError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_items(
        &self,
        source_id: i64,
        limit: usize,
        include_related: bool,
    ) -> Result<Vec<ItemDescriptor>, TaskError> {
        Ok(self
            .scan(source_id, limit, include_related)
            .await?
            .into_iter()
            .map(|(item, _)| item)
            .collect())
    }

    async fn fetch(
        &self,
        item: &ItemDescriptor,
        dest: &Path,
        on_progress: &mut ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, TaskError> {
        let (_, src_path) = self
            .locate(item.source_id, item.item_id)
            .await?
            .ok_or_else(|| TaskError::NotFound(format!("item {}", item.task_id())))?;
        let mut src = tokio::fs::File::open(&src_path).await.map_err(remote_err)?;
        let total = src.metadata().await.map_err(remote_err)?.len();
        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TaskError::io("create destination", dest, e))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            let n = src.read(&mut buf).await.map_err(remote_err)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .await
                .map_err(|e| TaskError::io("write destination", dest, e))?;
            transferred += n as u64;
            if on_progress(transferred, total) == TransferControl::Abort {
                return Err(TaskError::Cancelled);
            }
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
        }
        out.flush()
            .await
            .map_err(|e| TaskError::io("flush destination", dest, e))?;
        Ok(transferred)
    }

    async fn fetch_thumbnail(&self, item: &ItemDescriptor) -> Result<Option<Vec<u8>>, TaskError> {
        let Some((_, path)) = self.locate(item.source_id, item.item_id).await? else {
            return Ok(None);
        };
        let mut thumb = path.into_os_string();
        thumb.push(THUMB_SUFFIX);
        match tokio::fs::read(PathBuf::from(thumb)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(remote_err(e)),
        }
    }
}
