//! In-memory TTL cache.
//!
//! Injected into the registry loader, the statement client and the
//! keyword search so that repeated lookups inside the expiry window skip
//! the network. Expiry is explicit per entry, and expired entries are
//! swept on every insert.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.inserted_at < self.ttl
    }
}

/// Key/value store with a per-entry time-to-live.
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            hits: 0,
            misses: 0,
        }
    }

    /// Return a clone of the cached value if it has not expired.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.hits += 1;
                Some(entry.value.clone())
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.insert_with_ttl(key, value, ttl);
    }

    /// Insert with an explicit TTL, dropping expired entries first.
    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        self.evict_expired();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Utc::now(),
                ttl,
            },
        );
    }

    /// Remove expired entries.
    pub fn evict_expired(&mut self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| entry.is_fresh(now));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A `TtlCache` shareable behind `&self`, for clients used through
/// `Send + Sync` traits.
pub type SharedCache<K, V> = Mutex<TtlCache<K, V>>;

/// Build a shared cache with the given default TTL.
pub fn shared<K: Eq + Hash, V: Clone>(default_ttl: Duration) -> SharedCache<K, V> {
    Mutex::new(TtlCache::new(default_ttl))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
