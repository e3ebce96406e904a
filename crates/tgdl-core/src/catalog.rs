//! Cache-first access to remote sources and items.
//!
//! Every answer the link gives is written to the caches; later lookups for
//! the same key are served without a round-trip.

use std::path::PathBuf;

use crate::cache::{CachedListing, ItemCache, ListingCache, ListingKey, ThumbnailCache};
use crate::config::TgdlConfig;
use crate::error::TaskError;
use crate::link::LinkHandle;
use crate::media::{ItemDescriptor, SourceInfo};
use crate::registry::TaskId;

pub struct Catalog {
    link: LinkHandle,
    items: ItemCache,
    listings: ListingCache,
    thumbs: ThumbnailCache,
}

impl Catalog {
    pub fn new(link: LinkHandle, cfg: &TgdlConfig, thumbs: ThumbnailCache) -> Self {
        Self {
            link,
            items: ItemCache::new(cfg.item_cache_capacity),
            listings: ListingCache::new(cfg.listing_cache_capacity),
            thumbs,
        }
    }

    pub fn link(&self) -> &LinkHandle {
        &self.link
    }

    pub fn cached_item(&self, id: &TaskId) -> Option<ItemDescriptor> {
        self.items.get(id)
    }

    /// Item descriptor from the cache, or from the link (then cached).
    pub async fn resolve(&self, id: TaskId) -> Result<ItemDescriptor, TaskError> {
        if let Some(item) = self.items.get(&id) {
            return Ok(item);
        }
        let found = self
            .link
            .resolve_item(id.source_id, id.item_id)
            .await
            .map_err(TaskError::from)?;
        match found {
            Some(item) => {
                self.items.insert(item.clone());
                Ok(item)
            }
            None => Err(TaskError::NotFound(format!(
                "message {id} has no media or was deleted; rescan the source"
            ))),
        }
    }

    /// Media listing for a source. `refresh` bypasses the listing cache.
    pub async fn list(
        &self,
        source_id: i64,
        limit: usize,
        include_related: bool,
        refresh: bool,
    ) -> Result<CachedListing, TaskError> {
        let key = ListingKey {
            source_id,
            limit,
            include_related,
        };
        if !refresh {
            if let Some(hit) = self.listings.get(&key) {
                tracing::debug!(source_id, limit, "listing served from cache");
                return Ok(hit);
            }
        }
        let items = self
            .link
            .list_items(source_id, limit, include_related)
            .await
            .map_err(TaskError::from)?;
        self.items.extend(&items);
        tracing::debug!(source_id, count = items.len(), "listing fetched");
        Ok(self.listings.store(key, items))
    }

    pub async fn sources(&self, limit: usize) -> Result<Vec<SourceInfo>, TaskError> {
        self.link.list_sources(limit).await.map_err(TaskError::from)
    }

    pub async fn find_source(&self, query: &str) -> Result<Option<SourceInfo>, TaskError> {
        self.link.find_source(query).await.map_err(TaskError::from)
    }

    /// Local path of the item's thumbnail, fetching it once if needed.
    /// `None` when the item has no thumbnail.
    pub async fn thumbnail(&self, id: TaskId) -> Result<Option<PathBuf>, TaskError> {
        if let Some(path) = self.thumbs.get(&id).await {
            return Ok(Some(path));
        }
        let item = self.resolve(id).await?;
        if !item.has_thumbnail {
            return Ok(None);
        }
        let Some(bytes) = self
            .link
            .fetch_thumbnail(item)
            .await
            .map_err(TaskError::from)?
        else {
            return Ok(None);
        };
        let path = self
            .thumbs
            .store(&id, &bytes)
            .await
            .map_err(|e| TaskError::io("store thumbnail", self.thumbs.path_for(&id), e))?;
        Ok(Some(path))
    }
}
