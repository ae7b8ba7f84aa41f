//! Strongly-typed identifiers used across the workspace.
//!
//! Both identifiers are string-backed: order numbers come from the upstream
//! shop (e.g. `#4521`) and correlation ids are chosen by whoever requests an
//! enrichment (typically a mail or ticket id).

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Customer-facing order number, normalized without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

/// Caller-supplied identifier linking a cached order to the request context
/// that needed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl TryFrom<&str> for $t {
            type Error = DomainError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }
    };
}

impl OrderNumber {
    /// Parse and normalize an order number.
    ///
    /// Surrounding whitespace and a single leading `#` are stripped. The
    /// remainder must be non-empty and contain only ASCII alphanumerics or `-`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();

        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("OrderNumber: empty"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(DomainError::invalid_id(format!(
                "OrderNumber: unexpected characters in {trimmed:?}"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }
}

impl CorrelationId {
    /// Parse a correlation id. Any non-blank string is accepted (trimmed).
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("CorrelationId: empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl_string_newtype!(OrderNumber);
impl_string_newtype!(CorrelationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_strips_hash_and_whitespace() {
        let n = OrderNumber::parse("  #4521 ").unwrap();
        assert_eq!(n.as_str(), "4521");
        assert_eq!(n.to_string(), "4521");
    }

    #[test]
    fn order_number_rejects_empty_and_garbage() {
        assert!(matches!(
            OrderNumber::parse("#"),
            Err(DomainError::InvalidId(_))
        ));
        assert!(OrderNumber::parse("45 21").is_err());
        assert!(OrderNumber::parse("").is_err());
    }

    #[test]
    fn correlation_id_is_trimmed() {
        let id: CorrelationId = " mail-42 ".parse().unwrap();
        assert_eq!(id.as_str(), "mail-42");
        assert!(CorrelationId::parse("   ").is_err());
    }

    #[test]
    fn identifiers_serialize_as_plain_strings() {
        let n = OrderNumber::parse("#1001").unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"1001\"");

        let back: OrderNumber = serde_json::from_str("\"#1001\"").unwrap();
        assert_eq!(back, n);
        assert!(serde_json::from_str::<CorrelationId>("\"  \"").is_err());
    }
}
