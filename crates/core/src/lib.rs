//! `orderlink-core`: shared building blocks for the order-enrichment workspace.
//!
//! This crate contains **pure** primitives (no storage, no runtime concerns).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{CorrelationId, OrderNumber};
pub use value_object::ValueObject;
