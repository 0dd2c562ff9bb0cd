use std::time::{Duration, Instant};

use dashmap::DashMap;

/// In-process cache whose entries expire after a fixed time-to-live.
///
/// Expired entries are dropped lazily on read; `purge_expired` can be called
/// from a maintenance task to reclaim memory for keys that are never read
/// again.
pub struct TtlCache<V> {
    entries: DashMap<String, (Instant, V)>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.0.elapsed() < self.ttl => return Some(entry.1.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (inserted, _)| inserted.elapsed() < self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_fresh_values() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("crop_price_tomato_maharashtra_nashik", 12.5_f64);
        assert_eq!(cache.get("crop_price_tomato_maharashtra_nashik"), Some(12.5));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expired_values_are_dropped() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.insert("k", 1_u32);
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_removes_only_stale_entries() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.insert("a", 1_u32);
        cache.insert("b", 2_u32);
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 0);
    }
}
