//! Retention and expiry sweeps.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::CacheMaintenance;
use crate::jobs::JobStore;

/// Counts from one housekeeping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HousekeepingReport {
    pub pruned_jobs: u64,
    pub swept_entries: usize,
    pub errors: Vec<String>,
}

/// Prunes old terminal jobs and sweeps expired cache entries.
///
/// Purely operational: every failure is logged and recorded in the report,
/// never raised.
#[derive(Clone)]
pub struct Housekeeping {
    jobs: Arc<dyn JobStore>,
    caches: Vec<Arc<dyn CacheMaintenance>>,
    retention_days: u32,
}

impl Housekeeping {
    pub fn new(jobs: Arc<dyn JobStore>, retention_days: u32) -> Self {
        Self {
            jobs,
            caches: Vec::new(),
            retention_days,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheMaintenance>) -> Self {
        self.caches.push(cache);
        self
    }

    pub async fn run(&self) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();

        match self.jobs.prune(self.retention_days).await {
            Ok(n) => report.pruned_jobs = n,
            Err(e) => {
                warn!(error = %e, "job prune failed");
                report.errors.push(format!("prune: {e}"));
            }
        }

        for cache in &self.caches {
            match cache.sweep_expired().await {
                Ok(n) => report.swept_entries += n,
                Err(e) => {
                    warn!(error = %e, "cache sweep failed");
                    report.errors.push(format!("sweep: {e}"));
                }
            }
        }

        debug!(
            pruned_jobs = report.pruned_jobs,
            swept_entries = report.swept_entries,
            "housekeeping finished"
        );
        report
    }
}

impl std::fmt::Debug for Housekeeping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Housekeeping")
            .field("caches", &self.caches.len())
            .field("retention_days", &self.retention_days)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::cache::{CacheEntry, CacheStore, InMemoryCache};
    use crate::jobs::{InMemoryJobStore, Job, JobStatus, JobType};

    #[tokio::test]
    async fn prunes_old_jobs_and_sweeps_caches() {
        let jobs = Arc::new(InMemoryJobStore::default());
        let old = Utc::now() - chrono::Duration::days(30);
        let mut done = Job::new(JobType::FetchOrder, serde_json::json!({}), 0, 3, old);
        done.status = JobStatus::Completed;
        jobs.insert(done).unwrap();
        jobs.insert(Job::new(JobType::FetchOrder, serde_json::json!({}), 0, 3, old))
            .unwrap();

        let cache: Arc<InMemoryCache<u32, u32>> =
            Arc::new(InMemoryCache::unbounded(Duration::from_secs(60)));
        cache
            .insert_entry(1, CacheEntry::new(1, Duration::from_secs(1), old))
            .unwrap();
        cache.put(2, 2).await.unwrap();

        let report = Housekeeping::new(jobs.clone(), 7)
            .with_cache(cache.clone())
            .run()
            .await;

        assert_eq!(report.pruned_jobs, 1);
        assert_eq!(report.swept_entries, 1);
        assert!(report.errors.is_empty());
        assert_eq!(jobs.stats().await.unwrap().pending, 1);
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
