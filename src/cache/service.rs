use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use tracing::{debug, info};

use super::config::CacheConfig;
use super::keys::FragmentKey;
use super::store::FragmentStore;
use super::{
    METRIC_FRAGMENT_ENTRIES, METRIC_FRAGMENT_EVICT, METRIC_FRAGMENT_HIT,
    METRIC_FRAGMENT_INVALIDATE, METRIC_FRAGMENT_MISS,
};

/// Process-wide fragment cache.
///
/// Disabled caches keep no state: every lookup renders.
///
/// `generation` is bumped by every invalidation. A render that started under
/// an older generation is returned to its caller but never stored.
pub struct PageCache {
    store: Option<FragmentStore>,
    generation: AtomicU64,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        let store = config.enabled.then(|| FragmentStore::new(config));
        Self {
            store,
            generation: AtomicU64::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self {
            store: None,
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn get(&self, key: &FragmentKey) -> Option<Arc<str>> {
        let store = self.store.as_ref()?;
        let found = store.get(key);
        let metric = if found.is_some() {
            METRIC_FRAGMENT_HIT
        } else {
            METRIC_FRAGMENT_MISS
        };
        counter!(metric, "fragment" => key.name()).increment(1);
        found
    }

    pub fn put(&self, key: FragmentKey, body: String) -> Arc<str> {
        let body: Arc<str> = Arc::from(body);
        let Some(store) = self.store.as_ref() else {
            return body;
        };
        let name = key.name();
        if let Some(evicted) = store.put(key, body.clone()) {
            counter!(METRIC_FRAGMENT_EVICT, "fragment" => evicted.name()).increment(1);
            debug!(cache = "fragment", fragment = name, evicted = %evicted, "Evicted fragment");
        }
        gauge!(METRIC_FRAGMENT_ENTRIES).set(store.len() as f64);
        body
    }

    /// Returns the cached fragment or renders, stores and returns it.
    ///
    /// Render errors are passed through and nothing is stored.
    pub async fn get_or_render<F, Fut, E>(&self, key: &FragmentKey, render: F) -> Result<Arc<str>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let started = self.generation.load(Ordering::Acquire);
        let body = render().await?;
        if self.generation.load(Ordering::Acquire) != started {
            debug!(
                cache = "fragment",
                fragment = key.name(),
                "Skipped storing fragment rendered before an invalidation"
            );
            return Ok(Arc::from(body));
        }
        Ok(self.put(key.clone(), body))
    }

    /// Clears every fragment.
    pub fn invalidate_all(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        let cleared = store.clear();
        counter!(METRIC_FRAGMENT_INVALIDATE).increment(1);
        gauge!(METRIC_FRAGMENT_ENTRIES).set(0.0);
        info!(cache = "fragment", cleared, "Fragment cache invalidated");
    }

    pub fn len(&self) -> usize {
        self.store.as_ref().map_or(0, FragmentStore::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
