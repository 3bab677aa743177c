//! Bounded LRU map with a removal hook
//!
//! Wraps `lru::LruCache` so every value leaving the cache (capacity eviction,
//! replacement under the same key, shrink, clear) passes through one hook,
//! synchronously and exactly once.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Called with each entry that leaves the cache.
pub type EvictionHook<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
    on_evict: Option<EvictionHook<K, V>>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (zero is treated as one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(clamp_capacity(capacity)),
            on_evict: None,
        }
    }

    #[must_use]
    pub fn with_eviction_hook(capacity: usize, hook: EvictionHook<K, V>) -> Self {
        Self {
            inner: LruCache::new(clamp_capacity(capacity)),
            on_evict: Some(hook),
        }
    }

    /// Look up and mark as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Look up without touching recency.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Insert as most recently used. A displaced value (same key, or the
    /// least recently used entry at capacity) goes through the hook.
    pub fn put(&mut self, key: K, value: V) {
        if let Some((old_key, old_value)) = self.inner.push(key, value) {
            self.evicted(&old_key, &old_value);
        }
    }

    /// Remove one entry; the caller takes ownership and the hook is not run.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    /// Change capacity, evicting least recently used entries that no longer fit.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = clamp_capacity(capacity);
        while self.inner.len() > capacity.get() {
            match self.inner.pop_lru() {
                Some((k, v)) => self.evicted(&k, &v),
                None => break,
            }
        }
        self.inner.resize(capacity);
    }

    /// Remove everything, running the hook for each entry.
    pub fn clear(&mut self) {
        while let Some((k, v)) = self.inner.pop_lru() {
            self.evicted(&k, &v);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    fn evicted(&self, key: &K, value: &V) {
        if let Some(hook) = &self.on_evict {
            hook(key, value);
        }
    }
}

impl<K: Hash + Eq, V> Drop for BoundedCache<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K: Hash + Eq + fmt::Debug, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.inner.len())
            .field("capacity", &self.inner.cap())
            .field("has_hook", &self.on_evict.is_some())
            .finish()
    }
}

fn clamp_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
