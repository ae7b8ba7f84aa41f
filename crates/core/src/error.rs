//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failures while interpreting order data.
///
/// Retrying never fixes one of these. Storage and upstream failures have
/// their own error types in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A field is missing or has an unusable shape.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was rejected (e.g. empty order number).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A monetary amount could not be read as a decimal with two fraction digits.
    #[error("invalid money amount: {0:?}")]
    InvalidAmount(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_amount(raw: impl Into<String>) -> Self {
        Self::InvalidAmount(raw.into())
    }
}
