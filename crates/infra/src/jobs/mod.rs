//! Durable job queue for deferred order lookups.
//!
//! ## Design
//!
//! - Jobs are typed and carry an opaque JSON payload
//! - Claiming is a compare-and-swap on `status`, so concurrent workers never
//!   share a job
//! - Failures reschedule with exponential backoff until `max_attempts`
//! - Terminal jobs are pruned by retention housekeeping
//!
//! ## Components
//!
//! - `Job`: job row with lifecycle transitions
//! - `JobStore`: queue primitive (in-memory or Postgres)
//! - `RetryPolicy`: attempt budget and backoff

pub mod postgres;
pub mod store;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use postgres::PostgresJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use types::{
    BackoffStrategy, FetchOrderPayload, Job, JobId, JobStats, JobStatus, JobType, RetryPolicy,
    PRIORITY_INTERACTIVE, PRIORITY_PASSIVE,
};
