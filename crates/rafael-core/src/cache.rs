//! TTL cache with an injected clock.
//!
//! Entries expire `ttl` after they were written. Expiry is checked lazily on
//! read; [`TtlCache::cleanup`] sweeps everything already expired. The clock is
//! injected so expiry is testable without sleeping.

use std::collections::HashMap;
use std::time::Duration;

use crate::clock::SharedClock;

/// Default entry lifetime (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

struct CacheEntry<V> {
    value: V,
    expires_at_ms: u64,
}

/// Time-boxed key → value cache.
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl_ms: u64,
    clock: SharedClock,
    hits: u64,
    misses: u64,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            clock,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a live value. Expired entries are evicted and count as a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(entry) if now <= entry.expires_at_ms => {
                self.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                let _ = self.entries.remove(key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a value, replacing any previous entry and restarting its TTL.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let expires_at_ms = self.clock.now_ms().saturating_add(self.ttl_ms);
        let _ = self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
    }

    /// Remove one entry.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Drop every expired entry.
    pub fn cleanup(&mut self) {
        let now = self.clock.now_ms();
        self.entries.retain(|_, e| now <= e.expires_at_ms);
    }

    /// Remove all entries and reset stats.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Number of stored entries (expired ones included until swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation or the last [`clear`](Self::clear).
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
