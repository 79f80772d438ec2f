//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_FRAGMENT_LIMIT: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false every lookup renders and nothing is stored.
    pub enabled: bool,
    /// Maximum fragments kept before least-recently-used eviction.
    pub fragment_limit: usize,
    /// Entries older than this are treated as missing. `None` keeps them until invalidated.
    pub fragment_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fragment_limit: DEFAULT_FRAGMENT_LIMIT,
            fragment_ttl: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            fragment_limit: settings.fragment_limit.get(),
            fragment_ttl: settings.fragment_ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the fragment limit as NonZeroUsize, clamping to 1 if zero.
    pub fn fragment_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.fragment_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
