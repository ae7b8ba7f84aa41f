//! Payload shape returned by the upstream order API.
//!
//! Field names follow the upstream GraphQL response (camelCase). Monetary
//! amounts arrive as decimal strings. Anything optional upstream is optional
//! here; the mapper decides what is required.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrder {
    pub id: String,
    /// Customer-facing order name, e.g. `#4521`.
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_financial_status: Option<String>,
    #[serde(default)]
    pub display_fulfillment_status: Option<String>,
    pub currency_code: String,
    #[serde(default)]
    pub subtotal_price: Option<String>,
    #[serde(default)]
    pub total_shipping_price: Option<String>,
    #[serde(default)]
    pub total_tax: Option<String>,
    pub total_price: String,
    #[serde(default)]
    pub customer: Option<RawCustomer>,
    #[serde(default)]
    pub line_items: Vec<RawLineItem>,
    #[serde(default)]
    pub shipping_address: Option<RawAddress>,
    #[serde(default)]
    pub fulfillments: Vec<RawFulfillment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCustomer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineItem {
    pub title: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFulfillment {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tracking_company: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RawOrder {
    /// Snapshot of this payload as JSON, for durable caching.
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain owned data with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_upstream_payload() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "gid://shop/Order/1",
            "name": "#1001",
            "createdAt": "2024-05-01T10:00:00Z",
            "currencyCode": "EUR",
            "totalPrice": "19.90"
        }))
        .unwrap();

        assert_eq!(raw.name, "#1001");
        assert!(raw.line_items.is_empty());
        assert!(raw.customer.is_none());
    }

    #[test]
    fn json_snapshot_reads_back() {
        let raw: RawOrder = serde_json::from_value(serde_json::json!({
            "id": "gid://shop/Order/2",
            "name": "#1002",
            "createdAt": "2024-05-01T10:00:00Z",
            "currencyCode": "EUR",
            "totalPrice": "5.00",
            "lineItems": [{"title": "Sticker", "quantity": 2, "unitPrice": "2.50"}]
        }))
        .unwrap();

        let back = RawOrder::from_json(raw.to_json()).unwrap();
        assert_eq!(back, raw);
    }
}
