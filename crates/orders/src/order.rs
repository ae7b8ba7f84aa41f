use chrono::{DateTime, Utc};
use serde::Serialize;

use orderlink_core::{DomainError, DomainResult, OrderNumber, ValueObject};

/// Upstream order identifier (opaque, e.g. `gid://shop/Order/123`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::invalid_id("OrderId: empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monetary amount in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: String,
}

impl ValueObject for Money {}

impl Money {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }

    /// Parse a decimal string with up to two fraction digits (`"12.5"`, `"-3.99"`).
    pub fn parse_decimal(raw: &str, currency: impl Into<String>) -> DomainResult<Self> {
        let s = raw.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let invalid = || DomainError::invalid_amount(raw);

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac_minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac_minor))
            .ok_or_else(invalid)?;

        Ok(Self::new(if negative { -minor } else { minor }, currency))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

/// Payment state as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
    Unknown,
}

impl FinancialStatus {
    pub fn from_upstream(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("PENDING") => Self::Pending,
            Some("AUTHORIZED") => Self::Authorized,
            Some("PARTIALLY_PAID") => Self::PartiallyPaid,
            Some("PAID") => Self::Paid,
            Some("PARTIALLY_REFUNDED") => Self::PartiallyRefunded,
            Some("REFUNDED") => Self::Refunded,
            Some("VOIDED") => Self::Voided,
            _ => Self::Unknown,
        }
    }
}

/// Shipping state as reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Unfulfilled,
    PartiallyFulfilled,
    Fulfilled,
    Unknown,
}

impl FulfillmentStatus {
    pub fn from_upstream(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("UNFULFILLED") => Self::Unfulfilled,
            Some("PARTIALLY_FULFILLED") | Some("PARTIAL") => Self::PartiallyFulfilled,
            Some("FULFILLED") => Self::Fulfilled,
            _ => Self::Unknown,
        }
    }
}

/// Summarized lifecycle state used by support staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Shipped,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub title: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ValueObject for LineItem {}

impl LineItem {
    pub fn line_total(&self) -> Money {
        Money::new(
            self.unit_price.amount_minor.saturating_mul(i64::from(self.quantity)),
            self.unit_price.currency.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub name: Option<String>,
    pub lines: Vec<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country_code: Option<String>,
}

/// Shipping destination and tracking details, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingInfo {
    pub address: Option<Address>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

/// Order snapshot as seen by support tooling.
///
/// Built only by [`crate::map_raw_order`]; never mutated afterwards. A newer
/// snapshot replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    number: OrderNumber,
    status: OrderStatus,
    financial_status: FinancialStatus,
    fulfillment_status: FulfillmentStatus,
    customer: Customer,
    totals: OrderTotals,
    currency: String,
    line_items: Vec<LineItem>,
    shipping: Option<ShippingInfo>,
    created_at: DateTime<Utc>,
}

/// Field bundle used by the mapper to build an `Order`.
pub(crate) struct OrderParts {
    pub id: OrderId,
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub customer: Customer,
    pub totals: OrderTotals,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub shipping: Option<ShippingInfo>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub(crate) fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            number: parts.number,
            status: parts.status,
            financial_status: parts.financial_status,
            fulfillment_status: parts.fulfillment_status,
            customer: parts.customer,
            totals: parts.totals,
            currency: parts.currency,
            line_items: parts.line_items,
            shipping: parts.shipping,
            created_at: parts.created_at,
        }
    }

    /// Upstream identifier; stable across re-fetches of the same order.
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn number(&self) -> &OrderNumber {
        &self.number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn financial_status(&self) -> FinancialStatus {
        self.financial_status
    }

    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.fulfillment_status
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn shipping(&self) -> Option<&ShippingInfo> {
        self.shipping.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Total units across all line items.
    pub fn item_count(&self) -> u64 {
        self.line_items
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(u64::from(l.quantity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_parses_decimal_strings() {
        assert_eq!(Money::parse_decimal("12.50", "EUR").unwrap().amount_minor, 1250);
        assert_eq!(Money::parse_decimal("12.5", "EUR").unwrap().amount_minor, 1250);
        assert_eq!(Money::parse_decimal("7", "EUR").unwrap().amount_minor, 700);
        assert_eq!(Money::parse_decimal("-3.99", "EUR").unwrap().amount_minor, -399);
        assert_eq!(Money::parse_decimal("0.05", "EUR").unwrap().amount_minor, 5);
    }

    #[test]
    fn money_rejects_malformed_amounts() {
        for bad in ["", "abc", "1.234", "1,50", ".5", "1.x"] {
            assert!(
                matches!(Money::parse_decimal(bad, "EUR"), Err(DomainError::InvalidAmount(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn money_display_keeps_two_fraction_digits() {
        assert_eq!(Money::new(1205, "EUR").to_string(), "12.05 EUR");
        assert_eq!(Money::new(-50, "USD").to_string(), "-0.50 USD");
    }

    #[test]
    fn upstream_status_strings_are_case_insensitive() {
        assert_eq!(FinancialStatus::from_upstream(Some("paid")), FinancialStatus::Paid);
        assert_eq!(
            FinancialStatus::from_upstream(Some("PARTIALLY_REFUNDED")),
            FinancialStatus::PartiallyRefunded
        );
        assert_eq!(FinancialStatus::from_upstream(None), FinancialStatus::Unknown);
        assert_eq!(
            FulfillmentStatus::from_upstream(Some("Fulfilled")),
            FulfillmentStatus::Fulfilled
        );
    }

    #[test]
    fn line_total_multiplies_quantity() {
        let line = LineItem {
            title: "Mug".to_string(),
            sku: None,
            quantity: 3,
            unit_price: Money::new(450, "EUR"),
        };
        assert_eq!(line.line_total(), Money::new(1350, "EUR"));
    }
}
