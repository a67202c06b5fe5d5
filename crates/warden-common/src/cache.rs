//! Concurrent TTL cache
//!
//! Backs the webhook decision caches and the token result cache. The map is
//! lock-striped (dashmap), so reads do not block on writes to unrelated keys
//! under concurrent request load.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    deadline: Instant,
}

/// A bounded concurrent map whose entries expire after a per-entry TTL.
///
/// Entries are evicted lazily when read past their deadline; when the map is
/// at capacity, expired entries are pruned before the insert proceeds.
pub struct ExpiringCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    capacity: usize,
}

impl<K: Eq + Hash, V: Clone> ExpiringCache<K, V> {
    /// Create a cache holding at most roughly `capacity` live entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Look up a key, dropping it if its TTL has passed
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.deadline > now {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }
        // Expired: remove unless a concurrent insert refreshed it.
        self.entries.remove_if(key, |_, entry| entry.deadline <= now);
        None
    }

    /// Insert a value that expires after `ttl`
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        if self.entries.len() >= self.capacity {
            let now = Instant::now();
            self.entries.retain(|_, entry| entry.deadline > now);
        }
        self.entries.insert(
            key,
            Entry {
                value,
                deadline: Instant::now() + ttl,
            },
        );
    }

    /// Number of entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
