//! Processed-Set
//!
//! Addresses analyzed recently, bounded by an LRU capacity and a TTL.
//! Only the aggregator mutates it; pipeline workers never see it.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ProcessedSet {
    entries: Mutex<LruCache<String, Instant>>,
    ttl: Duration,
}

impl ProcessedSet {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// True when `address` was marked less than `ttl` ago. Expired entries are dropped.
    pub fn contains(&self, address: &str) -> bool {
        let mut entries = self.entries.lock();
        let fresh = entries
            .peek(address)
            .map(|marked_at| marked_at.elapsed() < self.ttl);
        match fresh {
            Some(true) => true,
            Some(false) => {
                entries.pop(address);
                false
            }
            None => false,
        }
    }

    /// Record `address` as processed now, evicting the least recent entry when full
    pub fn mark(&self, address: impl Into<String>) {
        self.entries.lock().put(address.into(), Instant::now());
    }

    pub fn remove(&self, address: &str) -> bool {
        self.entries.lock().pop(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let set = ProcessedSet::new(10, Duration::from_secs(60));
        set.mark("a");
        assert!(set.contains("a"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!set.contains("a"));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let set = ProcessedSet::new(2, Duration::from_secs(60));
        set.mark("a");
        set.mark("b");
        set.mark("c");

        assert_eq!(set.len(), 2);
        assert!(!set.contains("a"));
        assert!(set.contains("b"));
        assert!(set.contains("c"));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let set = ProcessedSet::new(0, Duration::from_secs(1));
        assert_eq!(set.capacity(), 1);
        set.mark("a");
        assert!(set.remove("a"));
        assert!(!set.remove("a"));
    }
}
