//! Time-bounded response cache.
//!
//! One storage, two access paths: `get_blocking`/`set_blocking` for thread
//! contexts and `get`/`set` for async tasks. Both observe the same entries.
//! Expired entries are dropped lazily when read; there is no capacity bound
//! and no background sweep.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A key → value store with optional per-entry expiry.
///
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly), so it can
/// be shared through an `Arc` by any number of concurrent runs.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up `key`, evicting it if it has expired.
    pub fn get_blocking(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store `value` under `key`. `None` means the entry never expires.
    pub fn set_blocking(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Async counterpart of [`TtlCache::get_blocking`].
    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_blocking(key)
    }

    /// Async counterpart of [`TtlCache::set_blocking`].
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.set_blocking(key, value, ttl)
    }

    /// Number of stored entries, including ones that expired but were not read since.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
