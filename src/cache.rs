//! Bounded TTL cache
//!
//! A key-value store where every entry carries its own expiry instant.
//! At capacity the entry with the earliest expiry is evicted, which is
//! O(size) per insert but needs no access-order bookkeeping. Used both
//! as the HTTP response cache and as the enrichment-lookup cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Bounded in-memory cache with per-entry TTL and earliest-expiry eviction
pub struct TtlCache<V> {
    state: Mutex<CacheState<V>>,
    max_size: usize,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        TtlCache {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_size,
            default_ttl,
        }
    }

    /// Get a value, counting a miss (and dropping the entry) if expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut state = self.state.lock().unwrap();

        let live = match state.entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                state.misses += 1;
                return None;
            }
        };

        match live {
            Some(value) => {
                state.hits += 1;
                Some(value)
            }
            None => {
                // Expired entries are reaped as a side effect of the miss
                state.entries.remove(key);
                state.misses += 1;
                None
            }
        }
    }

    /// Insert with the default TTL.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL, evicting the earliest-expiring entry
    /// if the cache is full.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    fn set_at(&self, key: &str, value: V, ttl: Duration, now: Instant) {
        let mut state = self.state.lock().unwrap();

        if !state.entries.contains_key(key) && state.entries.len() >= self.max_size {
            let evict = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = evict {
                state.entries.remove(&k);
            }
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.state.lock().unwrap().entries.remove(key);
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        let total = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if total > 0 {
                state.hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}
