//! Cache module for storing API responses in memory
//!
//! This module provides a bounded response cache keyed by the fully resolved
//! request URL. Entries are limited both by count and by age, and the next
//! eviction victim is picked from a recency queue that is advanced on every
//! fresh read. Expired entries are reported separately from plain misses so
//! callers can tell the two apart.

mod manager;

pub use manager::{
    CacheKey, CacheLookup, RequestCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_EXPIRATION,
};
