use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use super::BoundedCache;
use crate::media::ItemDescriptor;

/// One listing request: the same source scanned with a different page size
/// or related-items setting is a different listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub source_id: i64,
    pub limit: usize,
    pub include_related: bool,
}

#[derive(Debug, Clone)]
pub struct CachedListing {
    pub items: Arc<Vec<ItemDescriptor>>,
    pub fetched_at: SystemTime,
}

/// Previously computed listings, FIFO-evicted.
#[derive(Debug)]
pub struct ListingCache {
    inner: Mutex<BoundedCache<ListingKey, CachedListing>>,
}

impl ListingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &ListingKey) -> Option<CachedListing> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores a fresh listing, replacing an older one for the same key.
    pub fn store(&self, key: ListingKey, items: Vec<ItemDescriptor>) -> CachedListing {
        let listing = CachedListing {
            items: Arc::new(items),
            fetched_at: SystemTime::now(),
        };
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.remove(&key);
        inner.insert(key, listing.clone());
        listing
    }
}
