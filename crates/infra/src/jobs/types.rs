//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority used for lookups a user is actively waiting on.
pub const PRIORITY_INTERACTIVE: i32 = 10;
/// Priority used for passively discovered lookups (mail ingestion).
pub const PRIORITY_PASSIVE: i32 = 0;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job type for routing to the consumer that understands the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobType {
    /// Look up one order upstream and populate the durable order cache.
    FetchOrder,
    /// Any type this build does not consume (kept so rows round-trip).
    Other(String),
}

impl JobType {
    pub fn as_str(&self) -> &str {
        match self {
            JobType::FetchOrder => "fetch_order",
            JobType::Other(kind) => kind,
        }
    }
}

impl From<&str> for JobType {
    fn from(value: &str) -> Self {
        match value {
            "fetch_order" => JobType::FetchOrder,
            other => JobType::Other(other.to_string()),
        }
    }
}

impl From<String> for JobType {
    fn from(value: String) -> Self {
        JobType::from(value.as_str())
    }
}

impl From<JobType> for String {
    fn from(value: JobType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status.
///
/// `Pending -> Processing -> {Completed | Pending (rescheduled) | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting for `scheduled_at` and a claimer
    Pending,
    /// Claimed by exactly one worker
    Processing,
    /// Finished successfully
    Completed,
    /// Exhausted its attempts
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^attempts
    #[default]
    Exponential,
    /// Linear backoff: base * attempts
    Linear,
}

/// Retry policy applied by `JobStore::fail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts (claims) a job gets before it fails terminally
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay before the next claim, given the attempts consumed so far.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                // 2^20 * base is already far beyond any sensible retention window.
                let factor = 1u32 << attempts.min(20);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempts.max(1)),
        }
    }

    /// Check if another attempt is allowed.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// A queued unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    /// Opaque payload (see [`FetchOrderPayload`] for `fetch_order`)
    pub payload: serde_json::Value,
    pub status: JobStatus,
    /// Higher is serviced first
    pub priority: i32,
    /// Number of claims so far
    pub attempts: u32,
    pub max_attempts: u32,
    pub error_message: Option<String>,
    /// Earliest time the job may be claimed
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job, eligible immediately.
    pub fn new(
        job_type: JobType,
        payload: serde_json::Value,
        priority: i32,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            job_type,
            payload,
            status: JobStatus::Pending,
            priority,
            attempts: 0,
            max_attempts,
            error_message: None,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a claimer filtering on `types` may take this job at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>, types: Option<&[JobType]>) -> bool {
        self.status == JobStatus::Pending
            && self.scheduled_at <= now
            && types.is_none_or(|t| t.contains(&self.job_type))
    }

    /// Claim ordering: priority desc, then created_at asc (FIFO within a band).
    pub fn claim_order(a: &Job, b: &Job) -> std::cmp::Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.0.cmp(&b.id.0))
    }

    /// Pending -> Processing.
    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.attempts += 1;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    /// Processing -> Completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Processing -> Pending (rescheduled) or Failed (attempts exhausted).
    ///
    /// `delay_override` replaces the policy's backoff when the job is
    /// rescheduled; it has no effect on a terminal failure.
    pub fn mark_failed(
        &mut self,
        message: &str,
        policy: &RetryPolicy,
        delay_override: Option<Duration>,
        now: DateTime<Utc>,
    ) -> JobStatus {
        self.error_message = Some(message.to_string());
        self.updated_at = now;

        if self.attempts < self.max_attempts {
            let delay = delay_override.unwrap_or_else(|| policy.delay_for_attempt(self.attempts));
            let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
            let next = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
            // Keep reschedules strictly increasing even with a zero delay.
            self.scheduled_at = if next > self.scheduled_at {
                next
            } else {
                self.scheduled_at + chrono::Duration::microseconds(1)
            };
            self.status = JobStatus::Pending;
        } else {
            self.status = JobStatus::Failed;
            self.completed_at = Some(now);
        }

        self.status
    }
}

/// Payload carried by `fetch_order` jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOrderPayload {
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Explicit order number, when the producer already knows it
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub subject_text: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
}

impl FetchOrderPayload {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject_text = Some(subject.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_text = Some(body.into());
        self
    }

    pub fn with_from_email(mut self, email: impl Into<String>) -> Self {
        self.from_email = Some(email.into());
        self
    }

    pub fn with_order_number(mut self, number: impl Into<String>) -> Self {
        self.order_number = Some(number.into());
        self
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}
