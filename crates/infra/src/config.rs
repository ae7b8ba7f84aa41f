//! Configuration for the enrichment subsystem.
//!
//! Defaults are the production policy. `from_env` overrides individual values
//! from `ORDERLINK_*` variables (durations in whole seconds); anything unset
//! keeps its default.

use std::time::Duration;

use crate::jobs::{BackoffStrategy, RetryPolicy};

/// Worker pacing and rate-limit policy.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Upper bound on jobs handled by one run.
    pub max_jobs_per_run: usize,
    /// Pause between jobs to stay under upstream throughput limits.
    pub inter_job_delay: Duration,
    /// Pause after a rate-limit signal before the next job.
    pub rate_limit_cooldown: Duration,
    /// Reschedule delay applied to a job that hit the rate limit.
    pub rate_limit_reschedule: Duration,
    /// Consecutive rate-limit signals that end a run early.
    pub circuit_breaker_threshold: u32,
    /// How many orders to request for an email-only lookup.
    pub lookup_email_limit: usize,
    /// Period of the background scheduler.
    pub run_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_run: 5,
            inter_job_delay: Duration::from_secs(2),
            rate_limit_cooldown: Duration::from_secs(30),
            rate_limit_reschedule: Duration::from_secs(15 * 60),
            circuit_breaker_threshold: 2,
            lookup_email_limit: 5,
            run_interval: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Zero delays, for tests.
    pub fn without_delays(mut self) -> Self {
        self.inter_job_delay = Duration::ZERO;
        self.rate_limit_cooldown = Duration::ZERO;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// TTL of the durable, correlation-id keyed cache.
    pub durable_ttl: Duration,
    /// TTL of the process-local order cache.
    pub local_ttl: Duration,
    pub local_capacity: usize,
    /// Share of the local cache dropped when it is full.
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            durable_ttl: Duration::from_secs(15 * 60),
            local_ttl: Duration::from_secs(5 * 60),
            local_capacity: 500,
            eviction_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HousekeepingConfig {
    /// Terminal jobs older than this are pruned.
    pub job_retention_days: u32,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            job_retention_days: 7,
        }
    }
}

/// Everything the runtime needs to build the subsystem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentConfig {
    pub database_url: Option<String>,
    pub retry: RetryPolicy,
    pub worker: WorkerConfig,
    pub cache: CacheConfig,
    pub housekeeping: HousekeepingConfig,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}

impl EnrichmentConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup` (the environment, or a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        if let Some(v) = env.parse::<u32>("ORDERLINK_MAX_ATTEMPTS")? {
            config.retry.max_attempts = v;
        }
        if let Some(v) = env.secs("ORDERLINK_BACKOFF_BASE_SECS")? {
            config.retry.base_delay = v;
        }
        if let Some(raw) = env.raw("ORDERLINK_BACKOFF_STRATEGY") {
            config.retry.strategy = match raw.trim().to_ascii_lowercase().as_str() {
                "exponential" => BackoffStrategy::Exponential,
                "fixed" => BackoffStrategy::Fixed,
                "linear" => BackoffStrategy::Linear,
                _ => return Err(invalid("ORDERLINK_BACKOFF_STRATEGY", &raw)),
            };
        }

        let worker = &mut config.worker;
        if let Some(v) = env.parse::<usize>("ORDERLINK_MAX_JOBS_PER_RUN")? {
            worker.max_jobs_per_run = v;
        }
        if let Some(v) = env.secs("ORDERLINK_INTER_JOB_DELAY_SECS")? {
            worker.inter_job_delay = v;
        }
        if let Some(v) = env.secs("ORDERLINK_RATE_LIMIT_COOLDOWN_SECS")? {
            worker.rate_limit_cooldown = v;
        }
        if let Some(v) = env.secs("ORDERLINK_RATE_LIMIT_RESCHEDULE_SECS")? {
            worker.rate_limit_reschedule = v;
        }
        if let Some(v) = env.parse::<u32>("ORDERLINK_CIRCUIT_BREAKER_THRESHOLD")? {
            worker.circuit_breaker_threshold = v;
        }
        if let Some(v) = env.parse::<usize>("ORDERLINK_LOOKUP_EMAIL_LIMIT")? {
            worker.lookup_email_limit = v;
        }
        if let Some(v) = env.secs("ORDERLINK_RUN_INTERVAL_SECS")? {
            worker.run_interval = v;
        }

        let cache = &mut config.cache;
        if let Some(v) = env.secs("ORDERLINK_CACHE_TTL_SECS")? {
            cache.durable_ttl = v;
        }
        if let Some(v) = env.secs("ORDERLINK_LOCAL_CACHE_TTL_SECS")? {
            cache.local_ttl = v;
        }
        if let Some(v) = env.parse::<usize>("ORDERLINK_LOCAL_CACHE_CAPACITY")? {
            cache.local_capacity = v;
        }
        if let Some(v) = env.parse::<f64>("ORDERLINK_LOCAL_CACHE_EVICTION_FRACTION")? {
            cache.eviction_fraction = v;
        }

        if let Some(v) = env.parse::<u32>("ORDERLINK_JOB_RETENTION_DAYS")? {
            config.housekeeping.job_retention_days = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(invalid("ORDERLINK_MAX_ATTEMPTS", "0"));
        }
        if self.worker.max_jobs_per_run == 0 {
            return Err(invalid("ORDERLINK_MAX_JOBS_PER_RUN", "0"));
        }
        if self.worker.circuit_breaker_threshold == 0 {
            return Err(invalid("ORDERLINK_CIRCUIT_BREAKER_THRESHOLD", "0"));
        }
        if self.cache.local_capacity == 0 {
            return Err(invalid("ORDERLINK_LOCAL_CACHE_CAPACITY", "0"));
        }
        let fraction = self.cache.eviction_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid(
                "ORDERLINK_LOCAL_CACHE_EVICTION_FRACTION",
                &fraction.to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.raw(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| invalid(key, &raw)),
            None => Ok(None),
        }
    }

    fn secs(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parse::<u64>(key)?.map(Duration::from_secs))
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<EnrichmentConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnrichmentConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_match_production_policy() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, EnrichmentConfig::default());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.worker.max_jobs_per_run, 5);
        assert_eq!(config.worker.circuit_breaker_threshold, 2);
        assert_eq!(config.worker.rate_limit_cooldown, Duration::from_secs(30));
        assert_eq!(config.worker.rate_limit_reschedule, Duration::from_secs(900));
        assert_eq!(config.cache.durable_ttl, Duration::from_secs(900));
        assert_eq!(config.housekeeping.job_retention_days, 7);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = from_pairs(&[
            ("DATABASE_URL", "postgres://localhost/orderlink"),
            ("ORDERLINK_MAX_ATTEMPTS", "5"),
            ("ORDERLINK_BACKOFF_STRATEGY", "Fixed"),
            ("ORDERLINK_MAX_JOBS_PER_RUN", " 10 "),
            ("ORDERLINK_RATE_LIMIT_RESCHEDULE_SECS", "60"),
            ("ORDERLINK_LOCAL_CACHE_CAPACITY", "50"),
            ("ORDERLINK_JOB_RETENTION_DAYS", "30"),
        ])
        .unwrap();

        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/orderlink");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.strategy, BackoffStrategy::Fixed);
        assert_eq!(config.worker.max_jobs_per_run, 10);
        assert_eq!(config.worker.rate_limit_reschedule, Duration::from_secs(60));
        assert_eq!(config.cache.local_capacity, 50);
        assert_eq!(config.housekeeping.job_retention_days, 30);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = from_pairs(&[("ORDERLINK_INTER_JOB_DELAY_SECS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "ORDERLINK_INTER_JOB_DELAY_SECS".to_string(),
                value: "soon".to_string(),
            }
        );

        assert!(from_pairs(&[("ORDERLINK_LOCAL_CACHE_EVICTION_FRACTION", "1.5")]).is_err());
        assert!(from_pairs(&[("ORDERLINK_CIRCUIT_BREAKER_THRESHOLD", "0")]).is_err());
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = from_pairs(&[("ORDERLINK_MAX_ATTEMPTS", "  "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }
}
