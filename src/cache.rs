//! Byte-budgeted memo cache for expensive tree queries.
//!
//! Eviction is FIFO with touch: a successful [`MemoCache::get`] moves the key
//! to the back of the eviction order. Inserting beyond the budget evicts
//! whole entries from the front until the new entry fits or the cache is
//! empty. An entry larger than the whole budget is still stored and becomes
//! the first eviction candidate.
//!
//! Not thread-safe; owners that share a cache wrap it in a mutex.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

/// Size of a cached value in budget units.
pub trait MemoSize {
    fn memo_size(&self) -> usize;
}

impl MemoSize for String {
    fn memo_size(&self) -> usize {
        self.len()
    }
}

impl<T: MemoSize> MemoSize for Vec<T> {
    fn memo_size(&self) -> usize {
        self.iter().map(MemoSize::memo_size).sum::<usize>() + std::mem::size_of::<T>() * self.len()
    }
}

impl<T: MemoSize + ?Sized> MemoSize for Arc<T> {
    fn memo_size(&self) -> usize {
        (**self).memo_size()
    }
}

struct Entry<V> {
    value: V,
    size: usize,
}

pub struct MemoCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: VecDeque<K>,
    max_bytes: usize,
    usage: usize,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: MemoSize,
{
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_bytes,
            usage: 0,
        }
    }

    /// Insert `value` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: K, value: V) {
        self.remove(&key);

        let size = value.memo_size();
        while self.usage + size > self.max_bytes {
            if !self.evict_front() {
                break;
            }
        }

        self.usage += size;
        self.order.push_back(key.clone());
        self.entries.insert(key, Entry { value, size });
    }

    /// Look up `key`, moving it to the back of the eviction order.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.entries.get(key).map(|e| &e.value)
    }

    /// Look up `key` without touching it.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.usage -= entry.size;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_usage(&self) -> usize {
        self.usage
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.usage = 0;
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn evict_front(&mut self) -> bool {
        let Some(key) = self.order.pop_front() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.usage -= entry.size;
        }
        true
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: MemoSize + Clone,
{
    /// Return the cached value for `key`, or compute, cache, and return it.
    pub fn get_or_insert_with<F>(&mut self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value.clone();
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with);
    /// errors are not cached.
    pub fn try_get_or_insert_with<F, E>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value.clone());
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }
}
