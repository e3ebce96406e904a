use std::io;
use std::path::{Path, PathBuf};

use crate::registry::TaskId;
use crate::storage::temp_path;

/// Thumbnails persisted as `<dir>/<source>_<item>.jpg`. Unbounded; a present
/// file is never fetched again.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &TaskId) -> PathBuf {
        self.dir
            .join(format!("{}_{}.jpg", id.source_id, id.item_id))
    }

    /// Path of the cached thumbnail, if present.
    pub async fn get(&self, id: &TaskId) -> Option<PathBuf> {
        let path = self.path_for(id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    /// Writes the blob via a temp file and rename so readers never see half a thumbnail.
    pub async fn store(&self, id: &TaskId, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(id);
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }
}
