//! Fragment cache for rendered page regions.
//!
//! A [`PageCache`] maps a [`FragmentKey`] (fragment name plus vary-on values)
//! to rendered HTML. It is shared by `Arc` through the HTTP state and cleared
//! explicitly by the write paths that change what a fragment shows.
//!
//! ```toml
//! [cache]
//! enabled = true
//! fragment_limit = 256
//! # fragment_ttl_seconds = 20
//! ```

mod config;
mod keys;
mod lock;
mod service;
mod store;

pub use config::CacheConfig;
pub use keys::{FragmentKey, INDEX_PAGE_FRAGMENT};
pub use service::PageCache;
pub use store::FragmentStore;

pub const METRIC_FRAGMENT_HIT: &str = "yatube_cache_fragment_hit_total";
pub const METRIC_FRAGMENT_MISS: &str = "yatube_cache_fragment_miss_total";
pub const METRIC_FRAGMENT_EVICT: &str = "yatube_cache_fragment_evict_total";
pub const METRIC_FRAGMENT_INVALIDATE: &str = "yatube_cache_invalidate_total";
pub const METRIC_FRAGMENT_ENTRIES: &str = "yatube_cache_fragment_entries";
