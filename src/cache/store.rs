//! Bounded fragment storage.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;

use super::config::CacheConfig;
use super::keys::FragmentKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Clone)]
struct StoredFragment {
    body: Arc<str>,
    stored_at: Instant,
}

/// LRU map from fragment key to rendered output with an optional TTL.
pub struct FragmentStore {
    entries: RwLock<LruCache<FragmentKey, StoredFragment>>,
    ttl: Option<Duration>,
}

impl FragmentStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.fragment_limit_non_zero())),
            ttl: config.fragment_ttl,
        }
    }

    /// Returns the fragment if present and not expired; expired entries are dropped.
    pub fn get(&self, key: &FragmentKey) -> Option<Arc<str>> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => self
                .ttl
                .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl),
        };
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.body.clone())
    }

    /// Stores a fragment, returning the key evicted to make room, if any.
    pub fn put(&self, key: FragmentKey, body: Arc<str>) -> Option<FragmentKey> {
        let entry = StoredFragment {
            body,
            stored_at: Instant::now(),
        };
        rw_write(&self.entries, SOURCE, "put")
            .push(key.clone(), entry)
            .map(|(old_key, _)| old_key)
            .filter(|old_key| *old_key != key)
    }

    /// Drops every entry and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
