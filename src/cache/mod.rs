//! Bounded response cache with per-entry TTL and LRU eviction
//!
//! One [`CacheStore`] is constructed per cached concern and handed to its
//! callers; there is no global instance. All state sits behind a single
//! `parking_lot::Mutex` held for the duration of one operation only.
//!
//! # Eviction
//!
//! A `put` that leaves the store above capacity first reclaims every entry
//! that has already expired, then evicts live entries in least-recently-used
//! order until the store fits. Recency is ordered by `last_accessed`, then
//! earliest `created_at`, then touch order, so eviction is deterministic even
//! when a virtual clock hands out identical timestamps.
//!
//! # Expiry
//!
//! Expiry is lazy: an entry is never returned once `now >= expires_at`, and it
//! is physically removed when it is next touched, when capacity pressure
//! reclaims it, or by [`CacheStore::purge_expired`].

pub mod key;

pub use key::CacheKeyBuilder;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::clock::SharedClock;
use crate::metrics;

/// A cached value with its lifecycle timestamps
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Unique per stored entry, indexes the expiry queue
    id: u64,
    /// Position in the recency order
    recency: RecencyKey,
}

impl<V> CacheEntry<V> {
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Least-recently-used first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RecencyKey {
    last_accessed: DateTime<Utc>,
    created_at: DateTime<Utc>,
    stamp: u64,
}

/// Observability counters. Monotonic for the lifetime of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Live entries removed to make room
    pub evictions: u64,
    /// Expired entries reclaimed (on touch, under pressure, or by sweep)
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    recency: BTreeMap<RecencyKey, String>,
    expiry: BTreeMap<(DateTime<Utc>, u64), String>,
    next_stamp: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            expiry: BTreeMap::new(),
            next_stamp: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.recency);
        self.expiry.remove(&(entry.expires_at, entry.id));
        Some(entry)
    }

    /// Reclaim every entry with `expires_at <= now`
    fn reclaim_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut reclaimed = 0;
        while let Some((&(expires_at, _), key)) = self.expiry.iter().next() {
            if expires_at > now {
                break;
            }
            let key = key.clone();
            self.remove(&key);
            reclaimed += 1;
        }
        self.expirations += reclaimed as u64;
        reclaimed
    }

    /// Evict the least-recently-used entry
    fn evict_lru(&mut self) -> Option<String> {
        let key = self.recency.values().next()?.clone();
        self.remove(&key);
        self.evictions += 1;
        Some(key)
    }
}

/// Thread-safe TTL + LRU cache keyed by string
pub struct CacheStore<V> {
    name: &'static str,
    capacity: usize,
    default_ttl: Duration,
    clock: SharedClock,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> CacheStore<V> {
    /// Create a store holding at most `capacity` entries (minimum 1)
    pub fn new(
        name: &'static str,
        capacity: usize,
        default_ttl: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            default_ttl,
            clock,
            inner: Mutex::new(CacheInner::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Insert or overwrite `key`
    ///
    /// A non-positive `ttl` stores an entry that is already expired: the call
    /// succeeds but the value is never readable.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let expires_at = if ttl <= Duration::zero() {
            now
        } else {
            now.checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        };

        let mut inner = self.inner.lock();
        inner.remove(&key);

        let stamp = inner.stamp();
        let recency = RecencyKey {
            last_accessed: now,
            created_at: now,
            stamp,
        };
        inner.recency.insert(recency, key.clone());
        inner.expiry.insert((expires_at, stamp), key.clone());
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                created_at: now,
                expires_at,
                last_accessed: now,
                id: stamp,
                recency,
            },
        );

        if inner.entries.len() > self.capacity {
            let reclaimed = inner.reclaim_expired(now);
            let mut evicted = 0u64;
            while inner.entries.len() > self.capacity {
                match inner.evict_lru() {
                    Some(victim) => {
                        debug!(cache = self.name, key = %victim, "evicted LRU entry");
                        evicted += 1;
                    }
                    None => break,
                }
            }
            if reclaimed > 0 {
                metrics::CACHE_EXPIRATIONS_TOTAL
                    .with_label_values(&[self.name])
                    .inc_by(reclaimed as u64);
            }
            if evicted > 0 {
                metrics::CACHE_EVICTIONS_TOTAL
                    .with_label_values(&[self.name])
                    .inc_by(evicted);
            }
        }
        metrics::CACHE_SIZE
            .with_label_values(&[self.name])
            .set(inner.entries.len() as i64);
        drop(inner);

        metrics::CACHE_OPERATIONS_TOTAL
            .with_label_values(&[self.name, "put", "ok"])
            .inc();
    }

    /// Insert with the store's default TTL
    pub fn put_default(&self, key: impl Into<String>, value: V) {
        self.put(key, value, self.default_ttl);
    }

    /// Look up a live entry, promoting it to most-recently-used
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                drop(inner);
                self.record_lookup(key, "miss");
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.remove(key);
            inner.expirations += 1;
            inner.misses += 1;
            metrics::CACHE_SIZE
                .with_label_values(&[self.name])
                .set(inner.entries.len() as i64);
            drop(inner);
            metrics::CACHE_EXPIRATIONS_TOTAL
                .with_label_values(&[self.name])
                .inc();
            self.record_lookup(key, "expired");
            return None;
        }

        let stamp = inner.stamp();
        let CacheInner {
            entries, recency, ..
        } = &mut *inner;
        let entry = entries.get_mut(key)?;
        recency.remove(&entry.recency);
        entry.last_accessed = now;
        entry.recency = RecencyKey {
            last_accessed: now,
            created_at: entry.created_at,
            stamp,
        };
        recency.insert(entry.recency, entry.key.clone());
        let value = entry.value.clone();
        inner.hits += 1;
        drop(inner);

        self.record_lookup(key, "hit");
        Some(value)
    }

    /// Return the cached value or compute, store and return it
    ///
    /// `compute` runs outside the lock; concurrent misses on the same key may
    /// both compute, the last `put` wins.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl: Duration, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.put(key, value.clone(), ttl);
        value
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with).
    /// Errors are not cached.
    pub fn get_or_try_insert_with<F, E>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.put(key, value.clone(), ttl);
        Ok(value)
    }

    /// Whether `key` holds a live entry. Does not promote or count as a lookup.
    pub fn contains_live(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Remove `key`. Returns true if a live entry was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let removed = inner.remove(key);
        metrics::CACHE_SIZE
            .with_label_values(&[self.name])
            .set(inner.entries.len() as i64);
        removed.is_some_and(|e| !e.is_expired(now))
    }

    /// Remove every entry whose key starts with `prefix`. Returns the number
    /// of live entries removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        let mut live = 0;
        for key in &keys {
            if let Some(entry) = inner.remove(key) {
                if !entry.is_expired(now) {
                    live += 1;
                }
            }
        }
        metrics::CACHE_SIZE
            .with_label_values(&[self.name])
            .set(inner.entries.len() as i64);
        drop(inner);

        if !keys.is_empty() {
            debug!(cache = self.name, prefix = %prefix, removed = keys.len(), "invalidated prefix");
        }
        live
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.expiry.clear();
        metrics::CACHE_SIZE.with_label_values(&[self.name]).set(0);
    }

    /// Reclaim all expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let reclaimed = inner.reclaim_expired(now);
        metrics::CACHE_SIZE
            .with_label_values(&[self.name])
            .set(inner.entries.len() as i64);
        drop(inner);

        if reclaimed > 0 {
            metrics::CACHE_EXPIRATIONS_TOTAL
                .with_label_values(&[self.name])
                .inc_by(reclaimed as u64);
        }
        reclaimed
    }

    /// Number of stored entries, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            size: inner.entries.len(),
            capacity: self.capacity,
        }
    }

    fn record_lookup(&self, key: &str, result: &'static str) {
        debug!(cache = self.name, key = %key, result, "cache lookup");
        metrics::CACHE_OPERATIONS_TOTAL
            .with_label_values(&[self.name, "get", result])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn store(capacity: usize) -> (CacheStore<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = CacheStore::new("test", capacity, Duration::seconds(300), clock.clone());
        (store, clock)
    }

    #[test]
    fn test_put_then_get() {
        let (cache, _clock) = store(4);
        cache.put("a", 1, Duration::seconds(10));
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_entry_unreadable_at_expiry_instant() {
        let (cache, clock) = store(4);
        cache.put("a", 1, Duration::seconds(10));

        clock.advance(Duration::seconds(9));
        assert_eq!(cache.get("a"), Some(1));

        // now == expires_at is already expired
        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0, "expired entry reclaimed on touch");
    }

    #[test]
    fn test_non_positive_ttl_is_never_readable() {
        let (cache, _clock) = store(4);
        cache.put("zero", 1, Duration::zero());
        cache.put("negative", 2, Duration::seconds(-5));
        assert_eq!(cache.get("zero"), None);
        assert_eq!(cache.get("negative"), None);
    }

    #[test]
    fn test_overwrite_replaces_value_and_ttl() {
        let (cache, clock) = store(4);
        cache.put("a", 1, Duration::seconds(5));
        clock.advance(Duration::seconds(4));
        cache.put("a", 2, Duration::seconds(5));
        clock.advance(Duration::seconds(4));
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_victim_is_least_recently_touched() {
        let (cache, _clock) = store(3);
        cache.put("a", 1, Duration::seconds(60));
        cache.put("b", 2, Duration::seconds(60));
        cache.put("c", 3, Duration::seconds(60));

        // Same virtual instant everywhere: touch order alone decides
        assert_eq!(cache.get("a"), Some(1));
        cache.put("d", 4, Duration::seconds(60));

        assert!(cache.contains_live("a"));
        assert!(!cache.contains_live("b"));
        assert!(cache.contains_live("c"));
        assert!(cache.contains_live("d"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_expired_entries_reclaimed_before_live_victims() {
        let (cache, clock) = store(3);
        cache.put("live-old", 1, Duration::seconds(600));
        cache.put("short", 2, Duration::seconds(5));
        cache.put("live-new", 3, Duration::seconds(600));

        clock.advance(Duration::seconds(10));
        cache.put("incoming", 4, Duration::seconds(600));

        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
        assert!(cache.contains_live("live-old"));
        assert!(cache.contains_live("live-new"));
        assert!(cache.contains_live("incoming"));
    }

    #[test]
    fn test_ties_break_by_created_at() {
        let (cache, clock) = store(2);
        cache.put("first", 1, Duration::seconds(600));
        clock.advance(Duration::seconds(1));
        cache.put("second", 2, Duration::seconds(600));
        clock.advance(Duration::seconds(1));

        // Both touched at the same instant: the earlier-created one loses
        cache.get("second");
        cache.get("first");
        cache.put("third", 3, Duration::seconds(600));

        assert!(!cache.contains_live("first"));
        assert!(cache.contains_live("second"));
    }

    #[test]
    fn test_invalidate_prefix_is_idempotent() {
        let (cache, _clock) = store(10);
        cache.put("recommendations:u1:limit=5", 1, Duration::seconds(60));
        cache.put("recommendations:u1:limit=10", 2, Duration::seconds(60));
        cache.put("recommendations:u2:limit=5", 3, Duration::seconds(60));

        assert_eq!(cache.invalidate_prefix("recommendations:u1:"), 2);
        assert_eq!(cache.invalidate_prefix("recommendations:u1:"), 0);
        assert!(cache.contains_live("recommendations:u2:limit=5"));
        assert!(!cache.invalidate("missing"));
    }

    #[test]
    fn test_stats_survive_clear() {
        let (cache, _clock) = store(2);
        cache.put("a", 1, Duration::seconds(60));
        cache.get("a");
        cache.get("nope");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let (cache, _clock) = store(2);
        let mut calls = 0;
        let v = cache.get_or_insert_with("k", Duration::seconds(60), || {
            calls += 1;
            7
        });
        assert_eq!(v, 7);
        let v = cache.get_or_insert_with("k", Duration::seconds(60), || {
            calls += 1;
            8
        });
        assert_eq!(v, 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = store(10);
        cache.put("a", 1, Duration::seconds(1));
        cache.put("b", 2, Duration::seconds(100));
        clock.advance(Duration::seconds(2));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
