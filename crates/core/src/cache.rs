//! Short-lived read-through cache with explicit invalidation.
//!
//! Entries expire after a fixed TTL, but expiry alone is not the consistency
//! mechanism: every write path that touches a cached key must call
//! [`TtlCache::invalidate`] before it returns. The cache is not synchronized;
//! callers share it behind a mutex.
//!
//! Read-through loads happen outside that mutex, so a load can race a write.
//! A loader takes a [`TtlCache::ticket`] before reading the backing store and
//! stores the result with [`TtlCache::insert_if_current`], which refuses the
//! value when the key was invalidated after the ticket was taken or while a
//! write on the key is still in flight ([`TtlCache::begin_write`]).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Default entry capacity.
pub const DEFAULT_CAPACITY: usize = 1_024;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<K, Entry<V>>,
    /// Bumped on every invalidation.
    clock: u64,
    /// Tickets at or below this are refused for every key.
    cleared_at: u64,
    invalidated_at: HashMap<K, u64>,
    writers: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// A zero `ttl` disables caching: inserts are dropped.
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
            cleared_at: 0,
            invalidated_at: HashMap::new(),
            writers: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Snapshot to take before loading a value from the backing store.
    pub fn ticket(&self) -> u64 {
        self.clock
    }

    /// Insert a value loaded under `ticket`, unless `key` was invalidated
    /// since then or a write on it is in flight. Returns whether it was kept.
    pub fn insert_if_current(&mut self, key: K, value: V, ticket: u64) -> bool {
        if !self.is_current(&key, ticket) {
            return false;
        }
        self.insert(key, value);
        true
    }

    /// Mark a write on `key` as started. Loads that finish before the
    /// matching [`TtlCache::end_write`] are not cached.
    pub fn begin_write(&mut self, key: &K) {
        *self.writers.entry(key.clone()).or_insert(0) += 1;
        self.invalidate(key);
    }

    /// Mark a write on `key` as finished, committed or not.
    pub fn end_write(&mut self, key: &K) {
        if let Some(count) = self.writers.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.writers.remove(key);
            }
        }
        self.invalidate(key);
    }

    /// Drop the entry for `key`, if any. Returns whether one was present.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.clock += 1;
        if self.invalidated_at.len() >= self.capacity && !self.invalidated_at.contains_key(key) {
            // Fold per-key stamps into the global one: older tickets are refused.
            self.cleared_at = self.clock;
            self.invalidated_at.clear();
        } else {
            self.invalidated_at.insert(key.clone(), self.clock);
        }
        self.entries.remove(key).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.clock += 1;
        self.cleared_at = self.clock;
        self.invalidated_at.clear();
        self.entries.clear();
    }

    /// Number of entries, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_current(&self, key: &K, ticket: u64) -> bool {
        !self.writers.contains_key(key)
            && self.cleared_at <= ticket
            && self
                .invalidated_at
                .get(key)
                .map_or(true, |&stamp| stamp <= ticket)
    }

    fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert_at(&mut self, key: K, value: V, now: Instant) {
        if !self.is_enabled() {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.entries.retain(|_, e| e.expires_at > now);
            if self.entries.len() >= self.capacity {
                // Evict the entry closest to expiry.
                if let Some(oldest) = self
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }
}
