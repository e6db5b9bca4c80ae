use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Eviction strategy of the [`EvictionCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Evict the least recently used entry.
    #[default]
    Lru,
    /// Evict the most recently used entry.
    Mru,
}

/// A bounded key-value store with an atomic compute-if-absent operation.
///
/// Entries are handed out as `Arc<V>` clones, so an evicted value stays alive
/// for readers that already hold it. The internal lock is held across the
/// compute closure, which means concurrent callers never observe a partial
/// entry and the same key is never computed twice. A failing computation
/// leaves the cache untouched.
pub struct EvictionCache<K, V> {
    capacity: usize,
    strategy: Strategy,
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    tick: u64,
}

struct Entry<V> {
    value: Arc<V>,
    last_access: u64,
}

impl<K: Eq + Hash + Clone, V> EvictionCache<K, V> {
    /// Creates a cache holding at most `capacity` entries. Capacity zero is
    /// clamped to one, a cache that can hold nothing is never useful.
    pub fn new(capacity: usize, strategy: Strategy) -> Self {
        Self {
            capacity: capacity.max(1),
            strategy,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    pub fn compute_if_absent(&self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        match self.try_compute_if_absent(key, || Ok::<V, std::convert::Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`Self::compute_if_absent`], but the computation may fail. A
    /// failure is returned to the caller and nothing is inserted.
    pub fn try_compute_if_absent<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.last_access = tick;
            return Ok(entry.value.clone());
        }

        let value = Arc::new(compute()?);

        if inner.entries.len() >= self.capacity {
            let evict = match self.strategy {
                Strategy::Lru => inner
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_access),
                Strategy::Mru => inner
                    .entries
                    .iter()
                    .max_by_key(|(_, entry)| entry.last_access),
            }
            .map(|(key, _)| key.clone());
            if let Some(key) = evict {
                debug!("evicting cached entry");
                inner.entries.remove(&key);
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value: value.clone(),
                last_access: tick,
            },
        );

        Ok(value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drops every entry. Must be called when the data the cached values were
    /// derived from is replaced.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        // a poisoned lock only means another query panicked mid-insert, the
        // map itself is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_on_miss_and_caches() {
        let cache: EvictionCache<&str, u32> = EvictionCache::new(2, Strategy::Lru);
        assert_eq!(*cache.compute_if_absent("a", || 1), 1);
        // second lookup must not recompute
        assert_eq!(*cache.compute_if_absent("a", || 99), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache: EvictionCache<&str, u32> = EvictionCache::new(2, Strategy::Lru);
        cache.compute_if_absent("a", || 1);
        cache.compute_if_absent("b", || 2);
        cache.compute_if_absent("a", || 1);
        cache.compute_if_absent("c", || 3);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn mru_evicts_most_recently_used() {
        let cache: EvictionCache<&str, u32> = EvictionCache::new(2, Strategy::Mru);
        cache.compute_if_absent("a", || 1);
        cache.compute_if_absent("b", || 2);
        cache.compute_if_absent("c", || 3);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn failed_computation_is_not_cached() {
        let cache: EvictionCache<&str, u32> = EvictionCache::new(2, Strategy::Lru);
        let result: Result<_, &str> = cache.try_compute_if_absent("a", || Err("boom"));
        assert!(result.is_err());
        assert!(!cache.contains(&"a"));

        let result: Result<_, &str> = cache.try_compute_if_absent("a", || Ok(7));
        assert_eq!(*result.unwrap(), 7);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache: EvictionCache<&str, u32> = EvictionCache::new(4, Strategy::Lru);
        cache.compute_if_absent("a", || 1);
        cache.compute_if_absent("b", || 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn evicted_value_stays_alive_for_holders() {
        let cache: EvictionCache<&str, u32> = EvictionCache::new(1, Strategy::Lru);
        let first = cache.compute_if_absent("a", || 1);
        cache.compute_if_absent("b", || 2);
        assert!(!cache.contains(&"a"));
        assert_eq!(*first, 1);
    }
}
