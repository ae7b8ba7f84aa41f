//! Job storage abstraction and the in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::types::{Job, JobId, JobStats, JobStatus, JobType, RetryPolicy};

/// Durable queue primitive.
///
/// Cross-worker exclusion relies entirely on `claim` being an atomic
/// pending -> processing transition; implementations must guarantee that no
/// two callers ever receive the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job, eligible immediately.
    async fn try_enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: i32,
    ) -> Result<JobId, JobStoreError>;

    /// Best-effort enqueue: storage failures are logged and yield `None`.
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: i32,
    ) -> Option<JobId> {
        let type_name = job_type.to_string();
        match self.try_enqueue(job_type, payload, priority).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(job_type = %type_name, error = %e, "failed to enqueue job");
                None
            }
        }
    }

    /// Claim the next eligible job (priority desc, created_at asc), optionally
    /// restricted to `types`. Returns `None` when nothing is eligible; never
    /// waits.
    async fn claim(&self, types: Option<&[JobType]>) -> Result<Option<Job>, JobStoreError>;

    /// Processing -> Completed. Completing an already completed job is a no-op.
    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError>;

    /// Processing -> Pending with backoff, or Failed once attempts are exhausted.
    async fn fail(&self, job_id: JobId, message: &str) -> Result<JobStatus, JobStoreError> {
        self.fail_with_delay(job_id, message, None).await
    }

    /// Like [`JobStore::fail`], but `delay` (when given) replaces the backoff.
    async fn fail_with_delay(
        &self,
        job_id: JobId,
        message: &str,
        delay: Option<Duration>,
    ) -> Result<JobStatus, JobStoreError>;

    /// Delete completed/failed jobs last touched more than `older_than_days` ago.
    async fn prune(&self, older_than_days: u32) -> Result<u64, JobStoreError>;

    /// Get a job by ID.
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Job counts per status.
    async fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store for tests/dev.
///
/// `claim` follows the same select-then-compare-and-swap protocol as the
/// Postgres store: the candidate is chosen under a read lock and only taken if
/// it is still pending when the write lock is acquired.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    policy: RetryPolicy,
}

impl InMemoryJobStore {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Insert a fully-formed job (tests use this to seed back-dated rows).
    pub fn insert(&self, job: Job) -> Result<(), JobStoreError> {
        self.write()?.insert(job.id, job);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))
    }

    fn next_candidate(&self, types: Option<&[JobType]>) -> Result<Option<JobId>, JobStoreError> {
        let now = Utc::now();
        let jobs = self.read()?;
        Ok(jobs
            .values()
            .filter(|j| j.is_claimable(now, types))
            .min_by(|a, b| Job::claim_order(a, b))
            .map(|j| j.id))
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn try_enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: i32,
    ) -> Result<JobId, JobStoreError> {
        let job = Job::new(job_type, payload, priority, self.policy.max_attempts, Utc::now());
        let id = job.id;
        self.write()?.insert(id, job);
        Ok(id)
    }

    async fn claim(&self, types: Option<&[JobType]>) -> Result<Option<Job>, JobStoreError> {
        loop {
            let Some(candidate) = self.next_candidate(types)? else {
                return Ok(None);
            };

            let mut jobs = self.write()?;
            match jobs.get_mut(&candidate) {
                Some(job) if job.status == JobStatus::Pending => {
                    job.mark_processing(Utc::now());
                    return Ok(Some(job.clone()));
                }
                _ => {
                    debug!(job_id = %candidate, "lost claim race, reselecting");
                }
            }
        }
    }

    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        let mut jobs = self.write()?;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        match job.status {
            JobStatus::Processing => {
                job.mark_completed(Utc::now());
                Ok(())
            }
            JobStatus::Completed => Ok(()),
            from => Err(JobStoreError::InvalidTransition {
                job_id,
                from,
                to: JobStatus::Completed,
            }),
        }
    }

    async fn fail_with_delay(
        &self,
        job_id: JobId,
        message: &str,
        delay: Option<Duration>,
    ) -> Result<JobStatus, JobStoreError> {
        let mut jobs = self.write()?;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        if job.status != JobStatus::Processing {
            return Err(JobStoreError::InvalidTransition {
                job_id,
                from: job.status,
                to: JobStatus::Pending,
            });
        }
        Ok(job.mark_failed(message, &self.policy, delay, Utc::now()))
    }

    async fn prune(&self, older_than_days: u32) -> Result<u64, JobStoreError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let mut jobs = self.write()?;
        let before = jobs.len();
        jobs.retain(|_, j| !(j.status.is_terminal() && j.updated_at < cutoff));
        Ok((before - jobs.len()) as u64)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.read()?.get(&job_id).cloned())
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
