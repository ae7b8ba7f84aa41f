//! Generic TTL cache abstraction shared by the durable and local caches.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached value with its freshness window.
///
/// Invariant: `expires_at > fetched_at`. An entry is valid only while
/// `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Build an entry fetched at `now` that expires after `ttl`.
    ///
    /// A zero (or out-of-range) TTL is bumped to one millisecond so the entry
    /// still expires strictly after it was fetched.
    pub fn new(value: V, ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or(chrono::Duration::MAX)
            .max(chrono::Duration::milliseconds(1));
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            value,
            fetched_at: now,
            expires_at,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> CacheEntry<U> {
        CacheEntry {
            value: f(self.value),
            fetched_at: self.fetched_at,
            expires_at: self.expires_at,
        }
    }
}

/// What a cache does when it is full and a new key arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvictionPolicy {
    /// Never evict for capacity; entries only leave by expiry.
    Unbounded,
    /// Keep at most `capacity` entries; when full, drop expired entries and
    /// then the oldest `fraction` of the remainder (at least one).
    OldestFraction { capacity: usize, fraction: f64 },
}

impl EvictionPolicy {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            EvictionPolicy::Unbounded => None,
            EvictionPolicy::OldestFraction { capacity, .. } => Some(*capacity),
        }
    }
}

/// Cache error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(String),
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Maintenance operations that do not depend on the key/value types, so a
/// scheduler can hold any cache as `Arc<dyn CacheMaintenance>`.
#[async_trait]
pub trait CacheMaintenance: Send + Sync {
    /// Remove every entry whose `expires_at <= now`; returns how many were removed.
    async fn sweep_expired(&self) -> Result<usize, CacheError>;

    /// Number of stored entries, expired ones included until swept.
    async fn len(&self) -> Result<usize, CacheError>;

    async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }
}

/// Key/value cache with a fixed TTL.
///
/// `get` never returns an expired entry; absent and expired are the same miss.
/// `put` upserts and refreshes freshness (last write wins).
#[async_trait]
pub trait CacheStore<K, V>: CacheMaintenance
where
    K: Send + Sync,
    V: Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, CacheError>;

    async fn put(&self, key: K, value: V) -> Result<(), CacheError>;

    /// Time-to-live applied by `put`.
    fn ttl(&self) -> Duration;
}
