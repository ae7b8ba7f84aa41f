//! In-memory TTL cache with optional capacity-based eviction.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::store::{CacheEntry, CacheError, CacheMaintenance, CacheStore, EvictionPolicy};

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    /// Insertion order; smaller is older.
    seq: u64,
}

#[derive(Debug)]
struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_seq: u64,
}

/// Process-local cache.
///
/// Eviction races between concurrent writers are settled by the write lock;
/// the worst outcome of an unlucky interleaving is an extra upstream call.
#[derive(Debug)]
pub struct InMemoryCache<K, V> {
    inner: RwLock<Inner<K, V>>,
    ttl: Duration,
    eviction: EvictionPolicy,
}

impl<K, V> InMemoryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, eviction: EvictionPolicy) -> Self {
        let eviction = match eviction {
            EvictionPolicy::OldestFraction { capacity, fraction } => EvictionPolicy::OldestFraction {
                capacity: capacity.max(1),
                fraction: if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 },
            },
            unbounded => unbounded,
        };
        Self {
            inner: RwLock::new(Inner {
                slots: HashMap::new(),
                next_seq: 0,
            }),
            ttl,
            eviction,
        }
    }

    /// Bounded cache evicting the oldest `fraction` when `capacity` is reached.
    pub fn bounded(ttl: Duration, capacity: usize, fraction: f64) -> Self {
        Self::new(ttl, EvictionPolicy::OldestFraction { capacity, fraction })
    }

    pub fn unbounded(ttl: Duration) -> Self {
        Self::new(ttl, EvictionPolicy::Unbounded)
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Store a ready-made entry, bypassing the TTL (tests seed expired rows).
    pub fn insert_entry(&self, key: K, entry: CacheEntry<V>) -> Result<(), CacheError> {
        let mut inner = self.write()?;
        self.admit(&mut inner, key, entry);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner<K, V>>, CacheError> {
        self.inner
            .read()
            .map_err(|_| CacheError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner<K, V>>, CacheError> {
        self.inner
            .write()
            .map_err(|_| CacheError::Storage("lock poisoned".to_string()))
    }

    fn admit(&self, inner: &mut Inner<K, V>, key: K, entry: CacheEntry<V>) {
        if let EvictionPolicy::OldestFraction { capacity, fraction } = self.eviction {
            if !inner.slots.contains_key(&key) && inner.slots.len() >= capacity {
                evict(inner, capacity, fraction);
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.slots.insert(key, Slot { entry, seq });
    }
}

fn evict<K, V>(inner: &mut Inner<K, V>, capacity: usize, fraction: f64)
where
    K: Eq + Hash + Clone,
{
    let now = Utc::now();
    let before = inner.slots.len();
    inner.slots.retain(|_, slot| slot.entry.is_fresh(now));
    if inner.slots.len() < capacity {
        debug!(removed = before - inner.slots.len(), "cache full, dropped expired entries");
        return;
    }

    let target = ((capacity as f64) * fraction).ceil() as usize;
    let target = target.clamp(1, inner.slots.len());
    let mut by_age: Vec<(u64, K)> = inner
        .slots
        .iter()
        .map(|(k, slot)| (slot.seq, k.clone()))
        .collect();
    by_age.sort_unstable_by_key(|(seq, _)| *seq);
    for (_, key) in by_age.into_iter().take(target) {
        inner.slots.remove(&key);
    }
    debug!(evicted = before - inner.slots.len(), "cache full, evicted oldest entries");
}

#[async_trait]
impl<K, V> CacheMaintenance for InMemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let now = Utc::now();
        let mut inner = self.write()?;
        let before = inner.slots.len();
        inner.slots.retain(|_, slot| slot.entry.is_fresh(now));
        Ok(before - inner.slots.len())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.slots.len())
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for InMemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, CacheError> {
        let now = Utc::now();
        let inner = self.read()?;
        Ok(inner
            .slots
            .get(key)
            .filter(|slot| slot.entry.is_fresh(now))
            .map(|slot| slot.entry.clone()))
    }

    async fn put(&self, key: K, value: V) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, self.ttl, Utc::now());
        let mut inner = self.write()?;
        self.admit(&mut inner, key, entry);
        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cache(capacity: usize) -> InMemoryCache<String, u32> {
        InMemoryCache::bounded(Duration::from_secs(300), capacity, 0.2)
    }

    #[tokio::test]
    async fn put_then_get_returns_value() {
        let c = cache(10);
        c.put("4521".to_string(), 7).await.unwrap();
        let entry = c.get(&"4521".to_string()).await.unwrap().unwrap();
        assert_eq!(entry.value, 7);
        assert!(entry.is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let c = cache(10);
        c.put("a".to_string(), 1).await.unwrap();
        c.put("a".to_string(), 2).await.unwrap();
        assert_eq!(c.get(&"a".to_string()).await.unwrap().unwrap().value, 2);
        assert_eq!(c.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_misses_and_get_swept() {
        let c = cache(10);
        let past = Utc::now() - chrono::Duration::minutes(10);
        c.insert_entry("old".to_string(), CacheEntry::new(1, Duration::from_secs(60), past))
            .unwrap();
        c.put("new".to_string(), 2).await.unwrap();

        assert!(c.get(&"old".to_string()).await.unwrap().is_none());
        assert_eq!(c.len().await.unwrap(), 2);
        assert_eq!(c.sweep_expired().await.unwrap(), 1);
        assert_eq!(c.len().await.unwrap(), 1);
        assert!(c.get(&"new".to_string()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn full_cache_evicts_oldest_fifth() {
        let c = cache(10);
        for i in 0..10 {
            c.put(format!("k{i}"), i).await.unwrap();
        }
        c.put("k10".to_string(), 10).await.unwrap();

        assert_eq!(c.len().await.unwrap(), 9);
        assert!(c.get(&"k0".to_string()).await.unwrap().is_none());
        assert!(c.get(&"k1".to_string()).await.unwrap().is_none());
        assert!(c.get(&"k2".to_string()).await.unwrap().is_some());
        assert!(c.get(&"k10".to_string()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn full_cache_prefers_dropping_expired_entries() {
        let c = cache(3);
        let past = Utc::now() - chrono::Duration::minutes(10);
        c.put("a".to_string(), 1).await.unwrap();
        c.insert_entry("stale".to_string(), CacheEntry::new(0, Duration::from_secs(1), past))
            .unwrap();
        c.put("b".to_string(), 2).await.unwrap();
        c.put("c".to_string(), 3).await.unwrap();

        assert_eq!(c.len().await.unwrap(), 3);
        assert!(c.get(&"a".to_string()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unbounded_cache_never_evicts() {
        let c: InMemoryCache<u32, u32> = InMemoryCache::unbounded(Duration::from_secs(60));
        for i in 0..1000 {
            c.put(i, i).await.unwrap();
        }
        assert_eq!(c.len().await.unwrap(), 1000);
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(
            capacity in 1usize..40,
            keys in proptest::collection::vec(0u16..200, 0..300),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let c: InMemoryCache<u16, u16> =
                    InMemoryCache::bounded(Duration::from_secs(300), capacity, 0.2);
                for k in keys {
                    let before = c.len().await.unwrap();
                    let existed = c.get(&k).await.unwrap().is_some();
                    c.put(k, k).await.unwrap();
                    let after = c.len().await.unwrap();

                    prop_assert!(after <= capacity);
                    if before == capacity && !existed {
                        // A new key at capacity displaced at least one entry.
                        prop_assert!(after <= before);
                    }
                    prop_assert_eq!(c.get(&k).await.unwrap().map(|e| e.value), Some(k));
                }
                Ok(())
            })?;
        }
    }
}
