//! Process-wide TTL cache for resolved results
//!
//! String-keyed map with a sliding time-to-live per entry: a hit resets the
//! entry's window. There is no single-flight guarantee — concurrent misses
//! on the same key may both recompute and both write, which is acceptable
//! because resolution is idempotent. The cache is an injected instance, not
//! an ambient global.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

/// Sliding-TTL cache keyed by string
pub struct DirectoryCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Default for DirectoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> DirectoryCache<V> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key, refreshing its window on a hit
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.inserted_at.elapsed() < entry.ttl => {
                entry.inserted_at = Instant::now();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value with its own time-to-live, overwriting any entry
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.lock().insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Number of live and expired entries currently held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
