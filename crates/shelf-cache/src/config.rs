//! Configuration for the TTL cache.

use std::time::Duration;

/// Default lifetime of a cache entry (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Default value for the informational item ceiling.
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Configuration for a [`TtlCache`](crate::TtlCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime applied by `set`.
    pub default_ttl: Duration,

    /// Item ceiling reported by `stats`.
    /// Exceeding it never evicts anything.
    pub max_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the informational item ceiling.
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }
}
