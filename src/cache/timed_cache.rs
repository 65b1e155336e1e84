/// Generic in-memory cache where every entry carries its own expiry
///
/// Thread-safe, generic over key/value types.
/// Expired entries are never returned: they are evicted lazily on access and
/// `remove_expired` sweeps the whole map on demand.
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for expiry instants when `now + ttl` would overflow
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Cache entry with its expiry instant
///
/// Immutable once inserted; a refresh replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: now.checked_add(ttl).unwrap_or(now + MAX_TTL),
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub inserts: u64,
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

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    metrics: CacheMetrics,
}

/// Key/value store with per-entry TTL
///
/// Every read and write goes through one mutex, so no caller ever observes a
/// half-written entry. Producers for the async path run outside the lock:
/// concurrent misses on the same key may each produce, and the last write wins.
pub struct TimedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> Default for TimedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    /// Return the live value for `key`, or produce, store and return a new one
    ///
    /// The lock is held while `produce` runs.
    pub fn get_or_insert_with<F>(&self, key: K, ttl: Duration, produce: F) -> V
    where
        F: FnOnce() -> V,
    {
        let mut inner = self.inner.lock();
        if let Some(value) = Self::lookup_live(&mut inner, &key) {
            return value;
        }

        let value = produce();
        inner
            .entries
            .insert(key, CacheEntry::new(value.clone(), ttl));
        inner.metrics.inserts += 1;
        value
    }

    /// Async variant of [`TimedCache::get_or_insert_with`] for fallible producers
    ///
    /// The producer is awaited without holding the lock. An `Err` from the
    /// producer is returned unchanged and nothing is cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: K,
        ttl: Duration,
        produce: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        {
            let mut inner = self.inner.lock();
            if let Some(value) = Self::lookup_live(&mut inner, &key) {
                return Ok(value);
            }
        }

        let value = produce().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Non-evicting lookup; expired entries read as absent but stay in place
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.lock();
        let now = Instant::now();
        inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace the entry for `key`
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();
        inner.entries.insert(key, CacheEntry::new(value, ttl));
        inner.metrics.inserts += 1;
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.remove(key).map(|entry| entry.value)
    }

    /// Delete every entry whose expiry is at or before now
    ///
    /// Returns the number of removed entries.
    pub fn remove_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - inner.entries.len();
        inner.metrics.expirations += removed as u64;
        removed
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.lock().metrics.clone()
    }

    // Counts a hit or a miss; an expired entry is dropped and counted as a miss
    fn lookup_live(inner: &mut Inner<K, V>, key: &K) -> Option<V> {
        let now = Instant::now();
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                inner.metrics.hits += 1;
                Some(value)
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.metrics.expirations += 1;
                inner.metrics.misses += 1;
                None
            }
            None => {
                inner.metrics.misses += 1;
                None
            }
        }
    }
}
