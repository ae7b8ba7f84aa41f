//! Batch consumer of `fetch_order` jobs.
//!
//! One run claims up to `max_jobs_per_run` jobs, resolves each to an upstream
//! lookup, writes the raw payload into the durable [`OrderCache`] and
//! completes the job. A failed job never aborts the batch; it is handed back
//! to the queue with backoff.
//!
//! Rate limiting is handled separately from other failures: the job is
//! rescheduled far out, the worker cools down, and after
//! `circuit_breaker_threshold` consecutive signals the run stops early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use orderlink_core::{CorrelationId, OrderNumber};
use orderlink_orders::{extract_order_number_from_parts, normalize_email, RawOrder};

use crate::cache::OrderCache;
use crate::config::WorkerConfig;
use crate::external::{ExternalApiError, ExternalOrderClient};
use crate::jobs::{FetchOrderPayload, Job, JobStore, JobType};

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunReport {
    /// Jobs completed successfully.
    pub processed: usize,
    /// Jobs handed back to the queue (or failed terminally).
    pub failed: usize,
    pub errors: Vec<String>,
    /// The run stopped early because of consecutive rate-limit signals.
    pub circuit_open: bool,
}

impl RunReport {
    pub fn attempted(&self) -> usize {
        self.processed + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("an enrichment run is already in progress")]
    AlreadyRunning,
}

/// Why a single job could not be enriched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("invalid job payload: {0}")]
    Validation(String),
    #[error("no upstream order for {0}")]
    NotFound(String),
    #[error(transparent)]
    External(#[from] ExternalApiError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unusable upstream order: {0}")]
    Mapping(String),
}

impl EnrichmentError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, EnrichmentError::External(e) if e.is_rate_limit())
    }
}

/// What to ask the upstream for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Number(OrderNumber),
    Email(String),
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKey::Number(n) => write!(f, "order #{n}"),
            LookupKey::Email(e) => write!(f, "orders of {e}"),
        }
    }
}

/// Explicit order number first, then a number mined from subject/body, then
/// the sender's email.
pub fn resolve_lookup_key(payload: &FetchOrderPayload) -> Result<LookupKey, EnrichmentError> {
    if let Some(explicit) = payload.order_number.as_deref().filter(|n| !n.trim().is_empty()) {
        let number = OrderNumber::parse(explicit)
            .map_err(|e| EnrichmentError::Validation(format!("orderNumber: {e}")))?;
        return Ok(LookupKey::Number(number));
    }

    if let Some(number) =
        extract_order_number_from_parts(payload.subject_text.as_deref(), payload.body_text.as_deref())
    {
        return Ok(LookupKey::Number(number));
    }

    payload
        .from_email
        .as_deref()
        .and_then(normalize_email)
        .map(LookupKey::Email)
        .ok_or_else(|| {
            EnrichmentError::Validation("payload has neither an order number nor an email".into())
        })
}

/// Clears the running flag when the run ends, including on early return.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains `fetch_order` jobs into the durable order cache.
///
/// Runs of one instance are serialized by a re-entrancy guard. Separate
/// instances coordinate only through `JobStore::claim`.
pub struct EnrichmentWorker {
    jobs: Arc<dyn JobStore>,
    cache: OrderCache,
    client: Arc<dyn ExternalOrderClient>,
    config: WorkerConfig,
    running: AtomicBool,
}

impl EnrichmentWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        cache: OrderCache,
        client: Arc<dyn ExternalOrderClient>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            jobs,
            cache,
            client,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Process one batch. Refused while another run of this instance is active.
    pub async fn run(&self) -> Result<RunReport, WorkerError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(WorkerError::AlreadyRunning)?;

        let types = [JobType::FetchOrder];
        let mut report = RunReport::default();
        let mut consecutive_rate_limits: u32 = 0;

        while report.attempted() < self.config.max_jobs_per_run {
            let job = match self.jobs.claim(Some(&types)).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to claim job");
                    report.errors.push(format!("claim: {e}"));
                    break;
                }
            };
            debug!(job_id = %job.id, attempts = job.attempts, "claimed job");

            match self.process(&job).await {
                Ok(number) => {
                    consecutive_rate_limits = 0;
                    match self.jobs.complete(job.id).await {
                        Ok(()) => {
                            report.processed += 1;
                            debug!(job_id = %job.id, order_number = %number, "job completed");
                        }
                        Err(e) => {
                            // Cached but not completed: hand the job back for retry.
                            report.failed += 1;
                            report.errors.push(format!("{}: {e}", job.id));
                            error!(job_id = %job.id, error = %e, "failed to complete job");
                            let err = EnrichmentError::Storage(e.to_string());
                            self.give_back(&job, &err, None).await;
                        }
                    }
                }
                Err(e) if e.is_rate_limit() => {
                    consecutive_rate_limits += 1;
                    report.failed += 1;
                    report.errors.push(format!("{}: {e}", job.id));
                    warn!(
                        job_id = %job.id,
                        consecutive = consecutive_rate_limits,
                        "upstream rate limit, rescheduling job"
                    );
                    self.give_back(&job, &e, Some(self.config.rate_limit_reschedule))
                        .await;

                    if consecutive_rate_limits >= self.config.circuit_breaker_threshold {
                        warn!(
                            consecutive = consecutive_rate_limits,
                            "rate limit circuit open, ending run early"
                        );
                        report.circuit_open = true;
                        break;
                    }
                    if report.attempted() < self.config.max_jobs_per_run {
                        pause(self.config.rate_limit_cooldown).await;
                    }
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {e}", job.id));
                    warn!(job_id = %job.id, error = %e, "enrichment job failed");
                    self.give_back(&job, &e, None).await;
                }
            }

            if report.attempted() < self.config.max_jobs_per_run {
                pause(self.config.inter_job_delay).await;
            }
        }

        info!(
            processed = report.processed,
            failed = report.failed,
            circuit_open = report.circuit_open,
            "enrichment run finished"
        );
        Ok(report)
    }

    async fn process(&self, job: &Job) -> Result<OrderNumber, EnrichmentError> {
        let payload = FetchOrderPayload::from_value(&job.payload)
            .map_err(|e| EnrichmentError::Validation(e.to_string()))?;
        let correlation_id = CorrelationId::parse(payload.correlation_id.as_deref().unwrap_or(""))
            .map_err(|_| EnrichmentError::Validation("missing correlationId".into()))?;
        let key = resolve_lookup_key(&payload)?;

        let raw = self.fetch(&key).await?;
        let number = OrderNumber::parse(&raw.name)
            .map_err(|e| EnrichmentError::Mapping(format!("order name {:?}: {e}", raw.name)))?;

        self.cache
            .try_put(correlation_id, number.clone(), raw.to_json())
            .await
            .map_err(|e| EnrichmentError::Storage(e.to_string()))?;
        Ok(number)
    }

    async fn fetch(&self, key: &LookupKey) -> Result<RawOrder, EnrichmentError> {
        match key {
            LookupKey::Number(number) => self
                .client
                .get_order_by_number(number)
                .await?
                .ok_or_else(|| EnrichmentError::NotFound(key.to_string())),
            LookupKey::Email(email) => self
                .client
                .get_orders_by_email(email, self.config.lookup_email_limit)
                .await?
                .into_iter()
                .max_by_key(|o| o.created_at)
                .ok_or_else(|| EnrichmentError::NotFound(key.to_string())),
        }
    }

    async fn give_back(&self, job: &Job, err: &EnrichmentError, delay: Option<Duration>) {
        match self.jobs.fail_with_delay(job.id, &err.to_string(), delay).await {
            Ok(status) => debug!(job_id = %job.id, status = %status, "job handed back"),
            Err(e) => error!(job_id = %job.id, error = %e, "failed to record job failure"),
        }
    }
}

impl std::fmt::Debug for EnrichmentWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentWorker")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
