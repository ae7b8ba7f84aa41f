//! Startup wiring.
//!
//! Everything is built once from an [`EnrichmentConfig`] and handed out by
//! `Arc`. Nothing is constructed lazily from global state.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use orderlink_core::CorrelationId;

use crate::cache::{
    local_order_cache, CacheMaintenance, CacheStore, CachedOrder, InMemoryCache, LocalOrderCache,
    OrderCache, PostgresOrderCacheStore,
};
use crate::config::EnrichmentConfig;
use crate::db::ensure_schema;
use crate::enrichment::{EnrichmentWorker, EnrichmentWorkerHandle, Housekeeping};
use crate::external::ExternalOrderClient;
use crate::jobs::{InMemoryJobStore, JobStore, PostgresJobStore};
use crate::lookup::OrderLookupService;

/// The assembled enrichment subsystem.
#[derive(Clone)]
pub struct EnrichmentRuntime {
    pub config: EnrichmentConfig,
    pub jobs: Arc<dyn JobStore>,
    pub order_cache: OrderCache,
    pub local_cache: Arc<LocalOrderCache>,
    pub lookup: Arc<OrderLookupService>,
    pub worker: Arc<EnrichmentWorker>,
    durable_maintenance: Arc<dyn CacheMaintenance>,
}

impl EnrichmentRuntime {
    /// Connect to `DATABASE_URL`, apply the schema and build the Postgres-backed
    /// stores.
    pub async fn connect(
        config: EnrichmentConfig,
        client: Arc<dyn ExternalOrderClient>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid enrichment configuration")?;
        let url = config
            .require_database_url()
            .context("cannot connect without a database")?;
        let pool = PgPool::connect(url)
            .await
            .context("failed to connect to Postgres")?;
        ensure_schema(&pool).await?;
        info!("enrichment runtime connected to Postgres");
        Ok(Self::from_pool(pool, config, client))
    }

    /// Build on an existing pool. The schema must already exist.
    pub fn from_pool(
        pool: PgPool,
        config: EnrichmentConfig,
        client: Arc<dyn ExternalOrderClient>,
    ) -> Self {
        let jobs: Arc<dyn JobStore> =
            Arc::new(PostgresJobStore::new(pool.clone(), config.retry.clone()));
        let durable = Arc::new(PostgresOrderCacheStore::new(pool, config.cache.durable_ttl));
        Self::assemble(config, jobs, durable, client)
    }

    /// Single-process variant with in-memory stores (development and tests).
    pub fn in_memory(config: EnrichmentConfig, client: Arc<dyn ExternalOrderClient>) -> Self {
        let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new(config.retry.clone()));
        let durable = Arc::new(InMemoryCache::unbounded(config.cache.durable_ttl));
        Self::assemble(config, jobs, durable, client)
    }

    fn assemble<D>(
        config: EnrichmentConfig,
        jobs: Arc<dyn JobStore>,
        durable: Arc<D>,
        client: Arc<dyn ExternalOrderClient>,
    ) -> Self
    where
        D: CacheStore<CorrelationId, CachedOrder> + 'static,
    {
        let order_cache = OrderCache::new(durable.clone());
        let local_cache = Arc::new(local_order_cache(
            config.cache.local_ttl,
            config.cache.local_capacity,
            config.cache.eviction_fraction,
        ));
        let lookup = Arc::new(OrderLookupService::new(client.clone(), local_cache.clone()));
        let worker = Arc::new(EnrichmentWorker::new(
            jobs.clone(),
            order_cache.clone(),
            client,
            config.worker.clone(),
        ));

        Self {
            config,
            jobs,
            order_cache,
            local_cache,
            lookup,
            worker,
            durable_maintenance: durable,
        }
    }

    /// Housekeeping over the job queue and both caches.
    pub fn housekeeping(&self) -> Housekeeping {
        Housekeeping::new(self.jobs.clone(), self.config.housekeeping.job_retention_days)
            .with_cache(self.durable_maintenance.clone())
            .with_cache(self.local_cache.clone())
    }

    /// Start the periodic worker loop with housekeeping after every tick.
    pub fn spawn_worker(&self) -> EnrichmentWorkerHandle {
        self.worker
            .spawn(self.config.worker.run_interval, Some(self.housekeeping()))
    }
}

impl std::fmt::Debug for EnrichmentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentRuntime")
            .field("config", &self.config)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}
