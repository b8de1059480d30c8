//! TTL cache backed by a sharded concurrent map.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, trace};

use crate::config::CacheConfig;

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Concurrent string-keyed cache with absolute per-entry expiration.
///
/// Entries are evicted lazily: `get` on an expired key removes it and
/// reports a miss. Nothing else ever removes entries, so memory is bounded
/// by key cardinality rather than by time.
///
/// Cloning is cheap and yields a handle to the same underlying map.
pub struct TtlCache<V> {
    data: Arc<DashMap<String, CacheEntry<V>>>,
    items: Arc<AtomicUsize>,
    config: CacheConfig,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            items: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert or overwrite `key` using the configured default lifetime.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert or overwrite `key` with an explicit lifetime.
    ///
    /// A new key bumps the item counter. Going over `max_items` is logged
    /// and otherwise ignored.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry::new(value, ttl);

        match self.data.entry(key) {
            Entry::Occupied(mut occupied) => {
                trace!(key = %occupied.key(), "Cache entry overwritten");
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                // Counted while the shard is still locked so a racing eviction
                // of this key can only decrement after us.
                let items = self.items.fetch_add(1, Ordering::AcqRel) + 1;
                if items > self.config.max_items {
                    debug!(
                        key = %vacant.key(),
                        items,
                        max_items = self.config.max_items,
                        "Cache item count above configured maximum"
                    );
                }
                vacant.insert(entry);
            }
        }
    }

    /// Look up `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let entry = self.data.get(key)?;
            if !entry.is_expired_at(now) {
                trace!(key = %key, "Cache hit");
                return Some(entry.value.clone());
            }
        }

        // Only drop the entry if it is still the expired one; a concurrent
        // `set` may have replaced it since the read guard was released.
        if self
            .data
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            self.items.fetch_sub(1, Ordering::AcqRel);
            debug!(key = %key, "Cache entry expired, removed");
        }

        None
    }

    /// Drop `key` regardless of its expiration.
    pub fn remove(&self, key: &str) -> Option<V> {
        let (_, entry) = self.data.remove(key)?;
        self.items.fetch_sub(1, Ordering::AcqRel);
        debug!(key = %key, "Cache entry invalidated");
        Some(entry.value)
    }

    /// Number of resident entries, expired-but-unread ones included.
    pub fn len(&self) -> usize {
        self.items.load(Ordering::Acquire)
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let items = self.len();
        CacheStats {
            items,
            max_items: self.config.max_items,
            over_capacity: items > self.config.max_items,
        }
    }
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            items: Arc::clone(&self.items),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Value of the item counter.
    pub items: usize,

    /// Configured (unenforced) ceiling.
    pub max_items: usize,

    /// Whether the counter is above the ceiling.
    pub over_capacity: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn short_lived() -> TtlCache<String> {
        TtlCache::new(CacheConfig::new().with_ttl(Duration::from_millis(20)))
    }

    #[test]
    fn test_set_then_get() {
        let cache = TtlCache::new(CacheConfig::default());
        cache.set("k", "v".to_string());

        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_key() {
        let cache: TtlCache<String> = TtlCache::new(CacheConfig::default());
        assert_eq!(cache.get("nope"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_does_not_bump_counter() {
        let cache = TtlCache::new(CacheConfig::default());
        cache.set("k", 1);
        cache.set("k", 2);

        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = short_lived();
        cache.set("k", "v".to_string());
        assert_eq!(cache.len(), 1);

        thread::sleep(Duration::from_millis(40));

        // Still resident until someone reads it.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);

        // The slot is gone, so a fresh set counts as a new key.
        cache.set("k", "w".to_string());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), Some("w".to_string()));
    }

    #[test]
    fn test_unread_expired_entries_stay_resident() {
        let cache = short_lived();
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());

        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_with_ttl_overrides_default() {
        let cache = short_lived();
        cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(60));

        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_remove() {
        let cache = TtlCache::new(CacheConfig::default());
        cache.set("k", 7);

        assert_eq!(cache.remove("k"), Some(7));
        assert_eq!(cache.remove("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_max_items_is_not_enforced() {
        let cache = TtlCache::new(CacheConfig::new().with_max_items(2));
        for i in 0..5 {
            cache.set(format!("k{i}"), i);
        }

        assert_eq!(cache.len(), 5);
        for i in 0..5 {
            assert_eq!(cache.get(&format!("k{i}")), Some(i));
        }

        let stats = cache.stats();
        assert_eq!(stats.items, 5);
        assert_eq!(stats.max_items, 2);
        assert!(stats.over_capacity);
    }

    #[test]
    fn test_clone_shares_storage() {
        let cache = TtlCache::new(CacheConfig::default());
        let other = cache.clone();
        other.set("k", 1);

        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_concurrent_sets_never_tear() {
        let cache: TtlCache<Vec<u64>> = TtlCache::new(CacheConfig::default());
        let writers = 8u64;

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        // Every value is homogeneous, so a torn write would
                        // show up as a mix of writer ids.
                        cache.set("shared", vec![w; 64]);
                        if let Some(v) = cache.get("shared") {
                            assert!(v.iter().all(|x| *x == v[0]));
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let last = cache.get("shared").unwrap();
        assert_eq!(last.len(), 64);
        assert!(last[0] < writers);
        assert!(last.iter().all(|x| *x == last[0]));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_visible_across_tasks() {
        let cache = TtlCache::new(CacheConfig::default());
        let writer = cache.clone();

        tokio::spawn(async move { writer.set("k", "from-task".to_string()) })
            .await
            .unwrap();

        assert_eq!(cache.get("k"), Some("from-task".to_string()));
    }
}
