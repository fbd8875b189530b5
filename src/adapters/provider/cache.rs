//! TTL Cache Store
//!
//! Sharded key -> value cache with per-entry TTL. Expired entries are a miss
//! and are evicted lazily on read, or in bulk by `sweep_expired` / the
//! background sweeper. When `max_entries` is reached, expired entries are
//! swept first and then the oldest entry is evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Cache entry with TTL tracking
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub data: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(key: String, data: V, ttl: Duration) -> Self {
        Self {
            key,
            data,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Check if entry is still valid
    pub fn is_valid(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
pub struct CacheStore<V> {
    name: &'static str,
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> {
    /// Default max cache entries
    pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self::with_capacity(name, default_ttl, Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(name: &'static str, default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            default_ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a clone of the cached value if it has not expired
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.data.clone());
            }
        }

        // Expired or missing; the read guard is released by now
        if self.entries.remove_if(key, |_, e| !e.is_valid()).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Check if a valid entry exists
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.is_valid())
            .unwrap_or(false)
    }

    /// Insert with the store's default TTL
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Insert or overwrite `key`
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.sweep_expired();
            if self.entries.len() >= self.max_entries {
                self.remove_oldest();
            }
        }

        self.entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl));
    }

    /// Remove an entry from the cache
    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.data)
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove expired entries, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    fn remove_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Sweep expired entries every `interval` until `shutdown` flips to true
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            debug!("{} cache: swept {} expired entries", cache.name, removed);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CacheStore<u32> {
        CacheStore::new("test", Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_set_overwrite() {
        let cache = store();
        assert!(cache.get("a").is_none());

        cache.insert("a", 1);
        assert_eq!(cache.get("a"), Some(1));

        cache.insert("a", 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let cache = store();
        cache.set("a", 1, Duration::from_millis(100));
        assert!(cache.has("a"));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!cache.has("a"));
        assert_eq!(cache.get("a"), None);
        // lazily evicted on read
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let cache = store();
        cache.set("short", 1, Duration::from_millis(10));
        cache.set("long", 2, Duration::from_secs(10));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = CacheStore::with_capacity("test", Duration::from_secs(60), 2);
        cache.insert("first", 1);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.insert("second", 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.insert("third", 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("third"), Some(3));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = store();
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_hit_miss_counters() {
        let cache = store();
        cache.insert("a", 1);
        cache.get("a");
        cache.get("b");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task() {
        let cache = Arc::new(store());
        cache.set("a", 1, Duration::from_millis(10));

        let (tx, rx) = watch::channel(false);
        let handle = cache.spawn_sweeper(Duration::from_millis(100), rx);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(cache.len(), 0);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
