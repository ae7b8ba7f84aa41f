//! Upstream order API boundary.
//!
//! The transport (auth, token refresh, GraphQL wire format) lives behind
//! [`ExternalOrderClient`]; this crate only needs the two lookups and a rate
//! limit signal it can tell apart from other failures.

use std::time::Duration;

use async_trait::async_trait;

use orderlink_core::OrderNumber;
use orderlink_orders::RawOrder;

#[cfg(test)]
pub mod testing;

/// Client for the upstream order API.
///
/// Implementations bound every call with their own timeout and handle their
/// own authentication.
#[async_trait]
pub trait ExternalOrderClient: Send + Sync {
    /// Look up one order by its customer-facing number. `Ok(None)` when the
    /// upstream has no such order.
    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<RawOrder>, ExternalApiError>;

    /// Orders placed with `email`, most recent first, at most `limit`.
    async fn get_orders_by_email(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<RawOrder>, ExternalApiError>;
}

/// Upstream failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExternalApiError {
    /// The upstream refused the call because of request volume.
    #[error("upstream rate limit reached")]
    RateLimited { retry_after: Option<Duration> },
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ExternalApiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ExternalApiError::RateLimited { .. })
    }

    pub fn rate_limited() -> Self {
        ExternalApiError::RateLimited { retry_after: None }
    }
}
