use dashmap::DashMap;
use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

/// Cache entry with an optional expiry.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
    last_used: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Option<Duration>, tick: u64) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
            last_used: AtomicU64::new(tick),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Bounded LRU cache with optional per-entry TTL, safe to share across tasks.
///
/// Clones share the same storage.
#[derive(Debug)]
pub struct LRUCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
    capacity: usize,
    default_ttl: Option<Duration>,
    clock: Arc<AtomicU64>,
    stats: Arc<Stats>,
}

#[derive(Debug, Default)]
struct Stats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
}

impl<K, V> LRUCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(capacity, None)
    }

    pub fn with_ttl(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            capacity,
            default_ttl,
            clock: Arc::new(AtomicU64::new(0)),
            stats: Arc::default(),
        }
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.insert_with_ttl(key, value, self.default_ttl)
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) -> Option<V> {
        if self.capacity == 0 {
            return None;
        }

        if !self.data.contains_key(&key) && self.data.len() >= self.capacity {
            self.cleanup_expired();
            while self.data.len() >= self.capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }

        let entry = CacheEntry::new(value, ttl, self.tick());
        self.data.insert(key, entry).map(|old| old.value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let hit = match self.data.get(key) {
            Some(entry) if !entry.is_expired() => {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                // Expired; the read guard is gone by the time we remove.
                None
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match hit {
            Some(value) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                if self.data.remove_if(key, |_, entry| entry.is_expired()).is_some() {
                    self.stats.expired_removals.fetch_add(1, Ordering::Relaxed);
                }
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops expired entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.data.len());

        if removed > 0 {
            self.stats
                .expired_removals
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!("🧹 Removed {} expired cache entries", removed);
        }

        removed
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expired_removals: self.stats.expired_removals.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .data
            .iter()
            .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                self.data.remove(&key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl<K, V> Clone for LRUCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            capacity: self.capacity,
            default_ttl: self.default_ttl,
            clock: self.clock.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Hit/miss counters for a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
