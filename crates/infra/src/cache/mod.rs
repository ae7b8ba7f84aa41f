//! TTL caches for order data.
//!
//! One generic interface ([`CacheStore`]) with two backends:
//!
//! - `InMemoryCache`: process-local, optionally bounded with oldest-first
//!   eviction
//! - `PostgresOrderCacheStore`: durable, shared between processes
//!
//! Expired entries are removed by an explicit `sweep_expired` call driven by
//! the host scheduler, never by a background timer owned by the cache.

pub mod memory;
pub mod order_cache;
pub mod postgres;
pub mod store;
#[cfg(test)]
pub mod testing;

pub use memory::InMemoryCache;
pub use order_cache::{local_order_cache, CachedOrder, LocalOrderCache, OrderCache};
pub use postgres::PostgresOrderCacheStore;
pub use store::{CacheEntry, CacheError, CacheMaintenance, CacheStore, EvictionPolicy};
