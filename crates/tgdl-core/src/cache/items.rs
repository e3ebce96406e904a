use std::sync::{Mutex, PoisonError};

use super::BoundedCache;
use crate::media::ItemDescriptor;
use crate::registry::TaskId;

/// Task id → last-seen item descriptor.
#[derive(Debug)]
pub struct ItemCache {
    inner: Mutex<BoundedCache<TaskId, ItemDescriptor>>,
}

impl ItemCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BoundedCache::new(capacity)),
        }
    }

    pub fn get(&self, id: &TaskId) -> Option<ItemDescriptor> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn insert(&self, item: ItemDescriptor) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.task_id(), item);
    }

    pub fn extend<'a>(&self, items: impl IntoIterator<Item = &'a ItemDescriptor>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for item in items {
            inner.insert(item.task_id(), item.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
