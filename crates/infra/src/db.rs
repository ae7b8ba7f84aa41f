//! Postgres schema for the job queue and the durable order cache.

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

const SCHEMA: &[(&str, &str)] = &[
    (
        "jobs table",
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id            UUID PRIMARY KEY,
            job_type      TEXT NOT NULL,
            payload       JSONB NOT NULL,
            status        TEXT NOT NULL DEFAULT 'pending',
            priority      INTEGER NOT NULL DEFAULT 0,
            attempts      INTEGER NOT NULL DEFAULT 0,
            max_attempts  INTEGER NOT NULL DEFAULT 3,
            error_message TEXT NULL,
            scheduled_at  TIMESTAMPTZ NOT NULL,
            started_at    TIMESTAMPTZ NULL,
            completed_at  TIMESTAMPTZ NULL,
            created_at    TIMESTAMPTZ NOT NULL,
            updated_at    TIMESTAMPTZ NOT NULL
        )
        "#,
    ),
    (
        "jobs claim index",
        r#"
        CREATE INDEX IF NOT EXISTS idx_jobs_claim
            ON jobs (status, scheduled_at, priority DESC, created_at ASC)
        "#,
    ),
    (
        "order_cache table",
        r#"
        CREATE TABLE IF NOT EXISTS order_cache (
            correlation_id TEXT PRIMARY KEY,
            order_number   TEXT NOT NULL,
            payload        JSONB NOT NULL,
            fetched_at     TIMESTAMPTZ NOT NULL,
            expires_at     TIMESTAMPTZ NOT NULL,
            CHECK (expires_at > fetched_at)
        )
        "#,
    ),
    (
        "order_cache expiry index",
        r#"
        CREATE INDEX IF NOT EXISTS idx_order_cache_expires_at
            ON order_cache (expires_at)
        "#,
    ),
];

/// Create the tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for (what, statement) in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to create {what}"))?;
    }
    info!("database schema ready");
    Ok(())
}
