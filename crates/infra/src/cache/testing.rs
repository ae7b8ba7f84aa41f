//! Cache double whose backing storage is unreachable.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;

use super::store::{CacheEntry, CacheError, CacheMaintenance, CacheStore};

/// Every operation fails with [`CacheError::Storage`].
#[derive(Debug)]
pub struct UnavailableCacheStore<K, V> {
    ttl: Duration,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> UnavailableCacheStore<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            _types: PhantomData,
        }
    }
}

fn unavailable() -> CacheError {
    CacheError::Storage("connection refused".into())
}

#[async_trait]
impl<K, V> CacheMaintenance for UnavailableCacheStore<K, V> {
    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        Err(unavailable())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Err(unavailable())
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for UnavailableCacheStore<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, _key: &K) -> Result<Option<CacheEntry<V>>, CacheError> {
        Err(unavailable())
    }

    async fn put(&self, _key: K, _value: V) -> Result<(), CacheError> {
        Err(unavailable())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
