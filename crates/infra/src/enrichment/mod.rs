//! Background order enrichment: the worker, its scheduler and housekeeping.

pub mod housekeeping;
pub mod scheduler;
pub mod worker;

pub use housekeeping::{Housekeeping, HousekeepingReport};
pub use scheduler::EnrichmentWorkerHandle;
pub use worker::{
    resolve_lookup_key, EnrichmentError, EnrichmentWorker, LookupKey, RunReport, WorkerError,
};
