//! The two order caches built on [`CacheStore`].
//!
//! - [`OrderCache`]: durable, shared, keyed by correlation id, holding the raw
//!   upstream payload. Written by the enrichment worker, read by consumers
//!   deciding whether a fetch job is still needed.
//! - [`LocalOrderCache`]: process-local, bounded, keyed by order number,
//!   holding mapped [`Order`]s for the synchronous lookup path.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use orderlink_core::{CorrelationId, OrderNumber};
use orderlink_orders::{Order, RawOrder};

use super::memory::InMemoryCache;
use super::store::{CacheEntry, CacheError, CacheStore};

/// Snapshot stored in the durable cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedOrder {
    pub order_number: OrderNumber,
    pub payload: serde_json::Value,
}

impl CachedOrder {
    pub fn new(order_number: OrderNumber, payload: serde_json::Value) -> Self {
        Self {
            order_number,
            payload,
        }
    }

    pub fn from_raw(order_number: OrderNumber, raw: &RawOrder) -> Self {
        Self::new(order_number, raw.to_json())
    }

    /// Decode the snapshot back into the upstream payload shape.
    pub fn raw_order(&self) -> Result<RawOrder, CacheError> {
        RawOrder::from_json(self.payload.clone())
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

/// Durable cache of raw order payloads keyed by correlation id.
///
/// `get` and `put` are best-effort: storage failures are logged and surface
/// as a miss or a dropped write.
#[derive(Clone)]
pub struct OrderCache {
    store: Arc<dyn CacheStore<CorrelationId, CachedOrder>>,
}

impl OrderCache {
    pub fn new(store: Arc<dyn CacheStore<CorrelationId, CachedOrder>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore<CorrelationId, CachedOrder>> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.store.ttl()
    }

    pub async fn get(&self, correlation_id: &CorrelationId) -> Option<CacheEntry<CachedOrder>> {
        match self.store.get(correlation_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(correlation_id = %correlation_id, error = %e, "order cache read failed");
                None
            }
        }
    }

    pub async fn put(
        &self,
        correlation_id: CorrelationId,
        order_number: OrderNumber,
        payload: serde_json::Value,
    ) {
        let cid = correlation_id.clone();
        if let Err(e) = self.try_put(correlation_id, order_number, payload).await {
            warn!(correlation_id = %cid, error = %e, "order cache write failed");
        }
    }

    pub async fn try_put(
        &self,
        correlation_id: CorrelationId,
        order_number: OrderNumber,
        payload: serde_json::Value,
    ) -> Result<(), CacheError> {
        self.store
            .put(correlation_id, CachedOrder::new(order_number, payload))
            .await
    }
}

impl std::fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderCache")
            .field("ttl", &self.store.ttl())
            .finish_non_exhaustive()
    }
}

/// Process-local cache of mapped orders keyed by order number.
pub type LocalOrderCache = InMemoryCache<OrderNumber, Order>;

/// Bounded local cache: `capacity` entries, evicting the oldest `fraction`
/// when full.
pub fn local_order_cache(ttl: Duration, capacity: usize, fraction: f64) -> LocalOrderCache {
    InMemoryCache::bounded(ttl, capacity, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::UnavailableCacheStore;
    use crate::cache::CacheMaintenance;

    fn raw(name: &str) -> RawOrder {
        serde_json::from_value(serde_json::json!({
            "id": "gid://shop/Order/1",
            "name": name,
            "createdAt": "2024-05-01T10:00:00Z",
            "currencyCode": "EUR",
            "totalPrice": "10.00"
        }))
        .unwrap()
    }

    fn cache() -> OrderCache {
        OrderCache::new(Arc::new(InMemoryCache::unbounded(Duration::from_secs(900))))
    }

    #[tokio::test]
    async fn put_then_get_returns_snapshot() {
        let cache = cache();
        let cid = CorrelationId::parse("m1").unwrap();
        let number = OrderNumber::parse("4521").unwrap();

        cache
            .put(cid.clone(), number.clone(), raw("#4521").to_json())
            .await;

        let entry = cache.get(&cid).await.unwrap();
        assert_eq!(entry.value.order_number, number);
        assert_eq!(entry.value.raw_order().unwrap().name, "#4521");
        assert_eq!(
            entry.expires_at - entry.fetched_at,
            chrono::Duration::seconds(900)
        );
    }

    #[tokio::test]
    async fn repeated_put_is_last_write_wins() {
        let cache = cache();
        let cid = CorrelationId::parse("m1").unwrap();

        cache
            .put(cid.clone(), OrderNumber::parse("1000").unwrap(), raw("#1000").to_json())
            .await;
        cache
            .put(cid.clone(), OrderNumber::parse("2000").unwrap(), raw("#2000").to_json())
            .await;

        let entry = cache.get(&cid).await.unwrap();
        assert_eq!(entry.value.order_number.as_str(), "2000");
        assert_eq!(cache.store().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        assert!(cache().get(&CorrelationId::parse("nope").unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_storage_reads_as_miss_and_drops_writes() {
        let cache = OrderCache::new(Arc::new(UnavailableCacheStore::new(Duration::from_secs(900))));
        let cid = CorrelationId::parse("m1").unwrap();
        let number = OrderNumber::parse("4521").unwrap();

        assert!(cache.get(&cid).await.is_none());
        cache
            .put(cid.clone(), number.clone(), raw("#4521").to_json())
            .await;
        assert!(cache.get(&cid).await.is_none());

        assert!(matches!(
            cache.try_put(cid, number, raw("#4521").to_json()).await,
            Err(CacheError::Storage(_))
        ));
    }

    #[test]
    fn undecodable_snapshot_is_a_serialization_error() {
        let cached = CachedOrder::new(
            OrderNumber::parse("1").unwrap(),
            serde_json::json!({"unexpected": true}),
        );
        assert!(matches!(cached.raw_order(), Err(CacheError::Serialization(_))));
    }
}
