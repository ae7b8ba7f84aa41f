//! Job store double with switchable storage failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::store::{InMemoryJobStore, JobStore, JobStoreError};
use super::types::{Job, JobId, JobStats, JobStatus, JobType, RetryPolicy};

/// Wraps an [`InMemoryJobStore`]; `enqueue` and `complete` can be made to
/// fail with a storage error while everything else keeps working.
#[derive(Debug)]
pub struct FlakyJobStore {
    inner: InMemoryJobStore,
    enqueue_down: AtomicBool,
    complete_down: AtomicBool,
}

impl FlakyJobStore {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            inner: InMemoryJobStore::new(policy),
            enqueue_down: AtomicBool::new(false),
            complete_down: AtomicBool::new(false),
        }
    }

    pub fn fail_enqueue(&self, down: bool) {
        self.enqueue_down.store(down, Ordering::SeqCst);
    }

    pub fn fail_complete(&self, down: bool) {
        self.complete_down.store(down, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), JobStoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(JobStoreError::Storage("db down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn try_enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        priority: i32,
    ) -> Result<JobId, JobStoreError> {
        Self::check(&self.enqueue_down)?;
        self.inner.try_enqueue(job_type, payload, priority).await
    }

    async fn claim(&self, types: Option<&[JobType]>) -> Result<Option<Job>, JobStoreError> {
        self.inner.claim(types).await
    }

    async fn complete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        Self::check(&self.complete_down)?;
        self.inner.complete(job_id).await
    }

    async fn fail_with_delay(
        &self,
        job_id: JobId,
        message: &str,
        delay: Option<Duration>,
    ) -> Result<JobStatus, JobStoreError> {
        self.inner.fail_with_delay(job_id, message, delay).await
    }

    async fn prune(&self, older_than_days: u32) -> Result<u64, JobStoreError> {
        self.inner.prune(older_than_days).await
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.inner.get(job_id).await
    }

    async fn stats(&self) -> Result<JobStats, JobStoreError> {
        self.inner.stats().await
    }
}
