//! Infrastructure layer: job queue, caches, upstream client boundary and the
//! enrichment worker that ties them together.

pub mod cache;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod external;
pub mod jobs;
pub mod lookup;
pub mod runtime;

pub use config::{CacheConfig, ConfigError, EnrichmentConfig, HousekeepingConfig, WorkerConfig};
pub use enrichment::{EnrichmentWorker, EnrichmentWorkerHandle, Housekeeping, RunReport};
pub use external::{ExternalApiError, ExternalOrderClient};
pub use lookup::{LookupError, OrderLookupService};
pub use runtime::EnrichmentRuntime;
