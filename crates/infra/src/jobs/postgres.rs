//! Postgres-backed job store.
//!
//! ## Claim protocol
//!
//! `claim` is a two-step select + compare-and-swap:
//!
//! 1. select the id of the best eligible row (`status = 'pending'`,
//!    `scheduled_at <= now`, optional type filter) ordered by
//!    `priority DESC, created_at ASC, id ASC`
//! 2. `UPDATE ... WHERE id = $1 AND status = 'pending' RETURNING ...`
//!
//! If step 2 updates no row another worker won the race and selection starts
//! over. No advisory locks or `FOR UPDATE` are needed for correctness.
//!
//! ## Error Mapping
//!
//! Every `sqlx::Error` maps to `JobStoreError::Storage` with the failing
//! operation name in the message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobId, JobStats, JobStatus, JobType, RetryPolicy};

/// Oldest eligible pending job; same order as [`Job::claim_order`].
const SELECT_CANDIDATE: &str = r#"
    SELECT id
    FROM jobs
    WHERE status = 'pending'
      AND scheduled_at <= $1
      AND ($2::text[] IS NULL OR job_type = ANY($2))
    ORDER BY priority DESC, created_at ASC, id ASC
    LIMIT 1
"#;

const JOB_COLUMNS: &str = r#"
    id,
    job_type,
    payload,
    status,
    priority,
    attempts,
    max_attempts,
    error_message,
    scheduled_at,
    started_at,
    completed_at,
    created_at,
    updated_at
"#;

/// Postgres-backed job queue over the `jobs` table.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
    policy: RetryPolicy,
}

impl PostgresJobStore {
    /// Create a new PostgresJobStore with the given connection pool.
    pub fn new(pool: PgPool, policy: RetryPolicy) -> Self {
        Self {
            pool: Arc::new(pool),
            policy,
        }
    }

    async fn select_candidate(
        &self,
        types: Option<&[JobType]>,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, JobStoreError> {
        let type_names: Option<Vec<String>> =
            types.map(|t| t.iter().map(|t| t.as_str().to_string()).collect());

        let row = sqlx::query(SELECT_CANDIDATE)
        .bind(now)
        .bind(type_names)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_candidate", e))?;

        row.map(|r| r.try_get::<Uuid, _>("id"))
            .transpose()
            .map_err(|e| map_sqlx_error("select_candidate", e))
    }

    async fn current_status(&self, job_id: JobId) -> Result<JobStatus, JobStoreError> {
        let row = sqlx::query("SELECT status FROM jobs WHERE id = $1")
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("current_status", e))?
            .ok_or(JobStoreError::NotFound(job_id))?;

        let status: String = row
            .try_get("status")
            .map_err(|e| map_sqlx_error("current_status", e))?;
        parse_status(&status)
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, payload), fields(operation = "enqueue", job_type = %job_type), err)]
    async fn try_enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: i32,
    ) -> Result<JobId, JobStoreError> {
        let job = Job::new(job_type, payload, priority, self.policy.max_attempts, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id,
                job_type,
                payload,
                status,
                priority,
                attempts,
                max_attempts,
                scheduled_at,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.job_type.as_str())
        .bind(&job.payload)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(job.scheduled_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enqueue", e))?;

        Ok(job.id)
    }

    #[instrument(skip(self), fields(operation = "claim"), err)]
    async fn claim(&self, types: Option<&[JobType]>) -> Result<Option<Job>, JobStoreError> {
        loop {
            let now = Utc::now();
            let Some(candidate) = self.select_candidate(types, now).await? else {
                return Ok(None);
            };

            let row = sqlx::query(&format!(
                r#"
                UPDATE jobs
                SET status = 'processing',
                    attempts = attempts + 1,
                    started_at = $2,
                    updated_at = $2
                WHERE id = $1 AND status = 'pending'
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(candidate)
            .bind(now)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("claim", e))?;

            match row {
                Some(row) => return job_from_row(&row).map(Some),
                None => {
                    debug!(job_id = %candidate, "lost claim race, reselecting");
                }
            }
        }
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                completed_at = $2,
                updated_at = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("complete", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_status(job_id).await? {
            JobStatus::Completed => Ok(()),
            from => Err(JobStoreError::InvalidTransition {
                job_id,
                from,
                to: JobStatus::Completed,
            }),
        }
    }

    #[instrument(skip(self, message), fields(job_id = %job_id), err)]
    async fn fail_with_delay(
        &self,
        job_id: JobId,
        message: &str,
        delay: Option<Duration>,
    ) -> Result<JobStatus, JobStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("fail_select", e))?
        .ok_or(JobStoreError::NotFound(job_id))?;

        let mut job = job_from_row(&row)?;
        if job.status != JobStatus::Processing {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(JobStoreError::InvalidTransition {
                job_id,
                from: job.status,
                to: JobStatus::Pending,
            });
        }

        let status = job.mark_failed(message, &self.policy, delay, Utc::now());

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                error_message = $3,
                scheduled_at = $4,
                completed_at = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(job.status.as_str())
        .bind(&job.error_message)
        .bind(job.scheduled_at)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("fail_update", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(status)
    }

    #[instrument(skip(self), err)]
    async fn prune(&self, older_than_days: u32) -> Result<u64, JobStoreError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('completed', 'failed')
              AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("prune", e))?;

        Ok(result.rows_affected())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM jobs GROUP BY status")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stats", e))?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(|e| map_sqlx_error("stats", e))?;
            let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("stats", e))?;
            let n = n.max(0) as u64;
            match parse_status(&status)? {
                JobStatus::Pending => stats.pending = n,
                JobStatus::Processing => stats.processing = n,
                JobStatus::Completed => stats.completed = n,
                JobStatus::Failed => stats.failed = n,
            }
        }
        Ok(stats)
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, JobStoreError> {
    JobStatus::parse(raw)
        .ok_or_else(|| JobStoreError::Storage(format!("unknown job status in row: {raw:?}")))
}

fn job_from_row(row: &sqlx::postgres::PgRow) -> Result<Job, JobStoreError> {
    let get_err = |e| map_sqlx_error("decode_job_row", e);

    let status: String = row.try_get("status").map_err(get_err)?;
    let job_type: String = row.try_get("job_type").map_err(get_err)?;
    let attempts: i32 = row.try_get("attempts").map_err(get_err)?;
    let max_attempts: i32 = row.try_get("max_attempts").map_err(get_err)?;

    Ok(Job {
        id: JobId::from_uuid(row.try_get("id").map_err(get_err)?),
        job_type: JobType::from(job_type),
        payload: row.try_get("payload").map_err(get_err)?,
        status: parse_status(&status)?,
        priority: row.try_get("priority").map_err(get_err)?,
        attempts: attempts.max(0) as u32,
        max_attempts: max_attempts.max(0) as u32,
        error_message: row.try_get("error_message").map_err(get_err)?,
        scheduled_at: row.try_get("scheduled_at").map_err(get_err)?,
        started_at: row.try_get("started_at").map_err(get_err)?,
        completed_at: row.try_get("completed_at").map_err(get_err)?,
        created_at: row.try_get("created_at").map_err(get_err)?,
        updated_at: row.try_get("updated_at").map_err(get_err)?,
    })
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => JobStoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            JobStoreError::Storage(format!("connection pool timed out in {}", operation))
        }
        other => JobStoreError::Storage(format!("{} failed: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_a_storage_error() {
        assert!(matches!(parse_status("paused"), Err(JobStoreError::Storage(_))));
        assert_eq!(parse_status("processing").unwrap(), JobStatus::Processing);
    }

    #[test]
    fn pool_errors_map_to_storage() {
        let err = map_sqlx_error("claim", sqlx::Error::PoolClosed);
        assert!(matches!(err, JobStoreError::Storage(ref m) if m.contains("claim")));
    }

    #[test]
    fn candidate_order_breaks_timestamp_ties_by_id() {
        let order_by: String = SELECT_CANDIDATE
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("ORDER BY"))
            .unwrap()
            .to_string();
        assert_eq!(order_by, "ORDER BY priority DESC, created_at ASC, id ASC");
    }
}
