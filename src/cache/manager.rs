//! Bounded in-memory cache for raw API response bodies
//!
//! Provides a `RequestCache` that stores response bytes under a SHA-256 digest
//! of the request URL, with a maximum entry count and a maximum entry age.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Maximum number of responses kept by default
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// How long a cached response stays fresh by default (12 hours)
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(12 * 60 * 60);

/// Fixed-size digest of a raw cache key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hashes a raw key (usually a request URL) into a cache key
    pub fn digest(raw_key: &str) -> Self {
        Self(Sha256::digest(raw_key.as_bytes()).into())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first bytes are plenty to tell keys apart in logs
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The entry exists and is within the expiration window
    Fresh(Vec<u8>),
    /// The entry existed but had aged out; it has been removed
    Expired,
    /// No entry was ever stored under this key (or it was evicted)
    Missing,
}

impl CacheLookup {
    /// Returns the cached bytes for a fresh hit
    pub fn into_fresh(self) -> Option<Vec<u8>> {
        match self {
            CacheLookup::Fresh(value) => Some(value),
            CacheLookup::Expired | CacheLookup::Missing => None,
        }
    }

    /// Whether this lookup was a fresh hit
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheLookup::Fresh(_))
    }
}

/// A stored response body
#[derive(Debug)]
struct CacheEntry {
    /// The raw response body
    value: Vec<u8>,
    /// When the response was cached
    cached_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Oldest key at the front, most recently touched at the back
    recency: VecDeque<CacheKey>,
    capacity: usize,
    expiration: Duration,
}

impl CacheState {
    fn touch(&mut self, key: &CacheKey) {
        self.forget(key);
        self.recency.push_back(*key);
    }

    fn forget(&mut self, key: &CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let key = self.recency.pop_front()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.cached_at);
        match chrono::Duration::from_std(self.expiration) {
            Ok(expiration) => age > expiration,
            // Larger than chrono can represent: nothing ever expires
            Err(_) => false,
        }
    }
}

/// Thread-safe response cache bounded by entry count and entry age
///
/// Eviction takes the entry at the oldest end of the recency queue. A `put`
/// appends new keys at the recent end and a fresh `get` moves its key there,
/// so the victim is the entry whose last fresh read (or insertion, if never
/// read) is oldest. Storing a key that is already present is ignored: the
/// first stored value wins and its timestamp is not refreshed.
///
/// Expired entries are only purged when they are looked up; until then they
/// still occupy a slot.
#[derive(Debug)]
pub struct RequestCache {
    state: Mutex<CacheState>,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_EXPIRATION)
    }
}

impl RequestCache {
    /// Creates an empty cache
    ///
    /// A capacity of zero disables caching: `put` stores nothing.
    pub fn new(capacity: usize, expiration: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
                recency: VecDeque::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
                capacity,
                expiration,
            }),
        }
    }

    /// Stores a response body under `raw_key`
    ///
    /// Does nothing if the key is already cached. If the cache is full, the
    /// oldest entries are evicted first until there is room.
    pub fn put(&self, raw_key: &str, value: Vec<u8>) {
        let key = CacheKey::digest(raw_key);
        let mut state = self.state.lock();

        if state.capacity == 0 || state.entries.contains_key(&key) {
            return;
        }

        // A shrunk capacity may leave more than one entry to drop
        while state.entries.len() >= state.capacity {
            match state.evict_oldest() {
                Some(evicted) => debug!(key = ?evicted, "evicted cache entry"),
                None => break,
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: Utc::now(),
            },
        );
        state.recency.push_back(key);
    }

    /// Looks up the response body stored under `raw_key`
    ///
    /// A fresh hit promotes the key to the recent end of the eviction queue.
    /// An expired entry is removed and reported as `CacheLookup::Expired`;
    /// looking it up again afterwards yields `CacheLookup::Missing`.
    pub fn get(&self, raw_key: &str) -> CacheLookup {
        let key = CacheKey::digest(raw_key);
        let mut state = self.state.lock();

        let expired = match state.entries.get(&key) {
            None => return CacheLookup::Missing,
            Some(entry) => state.is_expired(entry, Utc::now()),
        };

        if expired {
            state.entries.remove(&key);
            state.forget(&key);
            return CacheLookup::Expired;
        }

        state.touch(&key);
        match state.entries.get(&key) {
            Some(entry) => CacheLookup::Fresh(entry.value.clone()),
            None => CacheLookup::Missing,
        }
    }

    /// Removes the entry at the oldest end of the recency queue, if any
    pub fn evict(&self) {
        self.state.lock().evict_oldest();
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Maximum age of a fresh entry
    pub fn expiration(&self) -> Duration {
        self.state.lock().expiration
    }

    /// Changes the entry limit; a smaller limit takes effect on the next `put`
    pub fn set_capacity(&self, capacity: usize) {
        self.state.lock().capacity = capacity;
    }

    /// Changes the freshness window; existing entries are judged by it on
    /// their next lookup
    pub fn set_expiration(&self, expiration: Duration) {
        self.state.lock().expiration = expiration;
    }

    #[cfg(test)]
    fn recency_matches_entries(&self) -> bool {
        let state = self.state.lock();
        let unique: std::collections::HashSet<_> = state.recency.iter().collect();
        unique.len() == state.recency.len()
            && state.recency.len() == state.entries.len()
            && state.recency.iter().all(|k| state.entries.contains_key(k))
    }
}
