//! Postgres-backed durable order cache.
//!
//! Rows live in `order_cache`, keyed by correlation id. `put` is an upsert,
//! so the latest write wins and refreshes `expires_at`. Expired rows stay in
//! the table until `sweep_expired` deletes them; `get` filters them out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use orderlink_core::{CorrelationId, OrderNumber};

use super::order_cache::CachedOrder;
use super::store::{CacheEntry, CacheError, CacheMaintenance, CacheStore};

#[derive(Debug, Clone)]
pub struct PostgresOrderCacheStore {
    pool: Arc<PgPool>,
    ttl: Duration,
}

impl PostgresOrderCacheStore {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            ttl,
        }
    }
}

#[async_trait]
impl CacheMaintenance for PostgresOrderCacheStore {
    #[instrument(skip(self), fields(operation = "sweep_order_cache"), err)]
    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let result = sqlx::query("DELETE FROM order_cache WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sweep_expired", e))?;
        Ok(result.rows_affected() as usize)
    }

    async fn len(&self) -> Result<usize, CacheError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM order_cache")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("len", e))?;
        let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("len", e))?;
        Ok(n.max(0) as usize)
    }
}

#[async_trait]
impl CacheStore<CorrelationId, CachedOrder> for PostgresOrderCacheStore {
    #[instrument(skip(self), fields(operation = "get_order_cache"), err)]
    async fn get(&self, key: &CorrelationId) -> Result<Option<CacheEntry<CachedOrder>>, CacheError> {
        let row = sqlx::query(
            r#"
            SELECT order_number, payload, fetched_at, expires_at
            FROM order_cache
            WHERE correlation_id = $1 AND expires_at > $2
            "#,
        )
        .bind(key.as_str())
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let get_err = |e| map_sqlx_error("decode_cache_row", e);
        entry_from_parts(
            row.try_get("order_number").map_err(get_err)?,
            row.try_get("payload").map_err(get_err)?,
            row.try_get("fetched_at").map_err(get_err)?,
            row.try_get("expires_at").map_err(get_err)?,
        )
        .map(Some)
    }

    #[instrument(skip(self, value), fields(operation = "put_order_cache"), err)]
    async fn put(&self, key: CorrelationId, value: CachedOrder) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, self.ttl, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO order_cache (
                correlation_id,
                order_number,
                payload,
                fetched_at,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (correlation_id) DO UPDATE
            SET order_number = EXCLUDED.order_number,
                payload = EXCLUDED.payload,
                fetched_at = EXCLUDED.fetched_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key.as_str())
        .bind(entry.value.order_number.as_str())
        .bind(&entry.value.payload)
        .bind(entry.fetched_at)
        .bind(entry.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("put", e))?;

        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn entry_from_parts(
    order_number: String,
    payload: serde_json::Value,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<CacheEntry<CachedOrder>, CacheError> {
    let order_number = OrderNumber::parse(&order_number)
        .map_err(|e| CacheError::Serialization(format!("stored order number: {e}")))?;
    Ok(CacheEntry {
        value: CachedOrder::new(order_number, payload),
        fetched_at,
        expires_at,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CacheError {
    match err {
        sqlx::Error::Database(db_err) => CacheError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::ColumnDecode { index, source } => CacheError::Serialization(format!(
            "{} could not decode column {}: {}",
            operation, index, source
        )),
        other => CacheError::Storage(format!("{} failed: {}", operation, other)),
    }
}
