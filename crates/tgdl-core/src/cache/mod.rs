//! Bounded lookup caches for previously seen items, listings and thumbnails.
//!
//! Hits never touch the link. Every key carries the source id because item
//! ids repeat across sources.

mod items;
mod listing;
mod thumbs;

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub use items::ItemCache;
pub use listing::{CachedListing, ListingCache, ListingKey};
pub use thumbs::ThumbnailCache;

/// Map with a capacity; once full, the oldest inserted key is evicted.
/// Overwriting an existing key keeps its original position.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.map.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let v = self.map.remove(key)?;
        self.order.retain(|k| k != key);
        Some(v)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
