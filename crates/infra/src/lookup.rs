//! Synchronous, cache-first order lookups for interactive callers.
//!
//! A rate-limited upstream is a normal outcome here: it reads as "no data
//! yet" (`None` / empty), while every other upstream failure is returned to
//! the caller.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use orderlink_core::{DomainError, OrderNumber};
use orderlink_orders::{map_raw_order, normalize_email, Order};

use crate::cache::{CacheStore, LocalOrderCache};
use crate::external::{ExternalApiError, ExternalOrderClient};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    External(#[from] ExternalApiError),
    #[error("upstream order could not be mapped: {0}")]
    Mapping(#[from] DomainError),
}

/// Cache-first facade over the upstream client.
///
/// Built once at startup and shared by `Arc`; safe to call concurrently.
pub struct OrderLookupService {
    client: Arc<dyn ExternalOrderClient>,
    local: Arc<LocalOrderCache>,
}

impl OrderLookupService {
    pub fn new(client: Arc<dyn ExternalOrderClient>, local: Arc<LocalOrderCache>) -> Self {
        Self { client, local }
    }

    pub fn local_cache(&self) -> &Arc<LocalOrderCache> {
        &self.local
    }

    /// Return the order, from the local cache when fresh, otherwise from the
    /// upstream (and then cache it). `Ok(None)` when the order does not exist
    /// or the upstream is rate limiting.
    #[instrument(skip(self, number), fields(order_number = %number), err)]
    pub async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<Order>, LookupError> {
        match self.local.get(number).await {
            Ok(Some(entry)) => {
                debug!("local cache hit");
                return Ok(Some(entry.value));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "local cache read failed"),
        }

        let raw = match self.client.get_order_by_number(number).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) if e.is_rate_limit() => {
                warn!("upstream rate limited, returning no data");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let order = map_raw_order(&raw)?;
        if let Err(e) = self.local.put(number.clone(), order.clone()).await {
            warn!(error = %e, "local cache write failed");
        }
        Ok(Some(order))
    }

    /// Orders placed with `email`, most recent first. Not cached; empty when
    /// the upstream is rate limiting or the email is blank.
    #[instrument(skip(self, email), err)]
    pub async fn get_orders_by_email(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<Order>, LookupError> {
        let Some(email) = normalize_email(email) else {
            debug!("blank email, nothing to look up");
            return Ok(Vec::new());
        };
        let raws = match self.client.get_orders_by_email(&email, limit).await {
            Ok(raws) => raws,
            Err(e) if e.is_rate_limit() => {
                warn!("upstream rate limited, returning no data");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut orders = raws
            .iter()
            .map(map_raw_order)
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        orders.truncate(limit);
        Ok(orders)
    }
}

impl std::fmt::Debug for OrderLookupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLookupService")
            .field("local", &self.local.eviction_policy())
            .finish_non_exhaustive()
    }
}
