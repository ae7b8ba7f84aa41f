//! Pure mapping from the upstream payload to the domain `Order`.

use orderlink_core::{DomainError, DomainResult, OrderNumber};

use crate::order::{
    Address, Customer, FinancialStatus, FulfillmentStatus, LineItem, Money, Order, OrderId,
    OrderParts, OrderStatus, OrderTotals, ShippingInfo,
};
use crate::raw::{RawAddress, RawCustomer, RawFulfillment, RawOrder};

/// Build an immutable `Order` from an upstream payload.
///
/// Deterministic and side-effect free. Fails when a required field cannot be
/// interpreted: an empty id or order name (`InvalidId`), a malformed amount
/// (`InvalidAmount`), a missing currency or negative quantity (`Validation`).
pub fn map_raw_order(raw: &RawOrder) -> DomainResult<Order> {
    let id = OrderId::new(raw.id.clone())?;
    let number = OrderNumber::parse(&raw.name)?;
    let currency = raw.currency_code.trim().to_ascii_uppercase();
    if currency.is_empty() {
        return Err(DomainError::validation("order currency is empty"));
    }

    let amount = |value: Option<&str>| -> DomainResult<Money> {
        match value {
            Some(v) if !v.trim().is_empty() => Money::parse_decimal(v, currency.clone()),
            _ => Ok(Money::zero(currency.clone())),
        }
    };

    let totals = OrderTotals {
        subtotal: amount(raw.subtotal_price.as_deref())?,
        shipping: amount(raw.total_shipping_price.as_deref())?,
        tax: amount(raw.total_tax.as_deref())?,
        total: Money::parse_decimal(&raw.total_price, currency.clone())?,
    };

    let line_items = raw
        .line_items
        .iter()
        .map(|line| {
            let quantity = u32::try_from(line.quantity).map_err(|_| {
                DomainError::validation(format!(
                    "line item {:?} has invalid quantity {}",
                    line.title, line.quantity
                ))
            })?;
            Ok(LineItem {
                title: line.title.clone(),
                sku: non_blank(line.sku.as_deref()),
                quantity,
                unit_price: Money::parse_decimal(&line.unit_price, currency.clone())?,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    let financial_status = FinancialStatus::from_upstream(raw.display_financial_status.as_deref());
    let fulfillment_status =
        FulfillmentStatus::from_upstream(raw.display_fulfillment_status.as_deref());

    let status = if raw.cancelled_at.is_some() {
        OrderStatus::Cancelled
    } else if financial_status == FinancialStatus::Refunded {
        OrderStatus::Refunded
    } else if fulfillment_status == FulfillmentStatus::Fulfilled {
        OrderStatus::Shipped
    } else {
        OrderStatus::Open
    };

    Ok(Order::from_parts(OrderParts {
        id,
        number,
        status,
        financial_status,
        fulfillment_status,
        customer: map_customer(raw.customer.as_ref(), raw),
        totals,
        currency,
        line_items,
        shipping: map_shipping(raw.shipping_address.as_ref(), &raw.fulfillments),
        created_at: raw.created_at,
    }))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed, ASCII-lowercased email; `None` when blank.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_lowercase())
}

fn map_customer(customer: Option<&RawCustomer>, raw: &RawOrder) -> Customer {
    let name = customer.and_then(|c| {
        let parts: Vec<&str> = [c.first_name.as_deref(), c.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    });
    let name = name.or_else(|| {
        raw.shipping_address
            .as_ref()
            .and_then(|a| non_blank(a.name.as_deref()))
    });

    let email = customer
        .and_then(|c| c.email.as_deref().and_then(normalize_email))
        .or_else(|| raw.email.as_deref().and_then(normalize_email));

    Customer { name, email }
}

fn map_address(addr: &RawAddress) -> Address {
    Address {
        name: non_blank(addr.name.as_deref()),
        lines: [addr.address1.as_deref(), addr.address2.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect(),
        city: non_blank(addr.city.as_deref()),
        zip: non_blank(addr.zip.as_deref()),
        country_code: non_blank(addr.country_code.as_deref()),
    }
}

fn map_shipping(address: Option<&RawAddress>, fulfillments: &[RawFulfillment]) -> Option<ShippingInfo> {
    // Most recent fulfillment carrying a tracking number wins.
    let tracked = fulfillments
        .iter()
        .enumerate()
        .filter(|(_, f)| non_blank(f.tracking_number.as_deref()).is_some())
        .max_by_key(|(idx, f)| (f.created_at, *idx))
        .map(|(_, f)| f);

    if address.is_none() && tracked.is_none() {
        return None;
    }

    Some(ShippingInfo {
        address: address.map(map_address),
        carrier: tracked.and_then(|f| non_blank(f.tracking_company.as_deref())),
        tracking_number: tracked.and_then(|f| non_blank(f.tracking_number.as_deref())),
        tracking_url: tracked.and_then(|f| non_blank(f.tracking_url.as_deref())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: serde_json::Value) -> RawOrder {
        serde_json::from_value(value).unwrap()
    }

    fn full_payload() -> serde_json::Value {
        serde_json::json!({
            "id": "gid://shop/Order/4521",
            "name": "#4521",
            "email": "Fallback@Example.com",
            "createdAt": "2024-05-01T10:00:00Z",
            "displayFinancialStatus": "PAID",
            "displayFulfillmentStatus": "FULFILLED",
            "currencyCode": "eur",
            "subtotalPrice": "40.00",
            "totalShippingPrice": "4.90",
            "totalTax": "7.60",
            "totalPrice": "44.90",
            "customer": {"firstName": "Ada", "lastName": "Lovelace", "email": "Ada@Example.com"},
            "lineItems": [
                {"title": "Mug", "sku": "MUG-1", "quantity": 2, "unitPrice": "12.50"},
                {"title": "Poster", "sku": " ", "quantity": 1, "unitPrice": "15"}
            ],
            "shippingAddress": {"name": "Ada L.", "address1": "1 Analytical St", "city": "London", "zip": "N1", "countryCode": "GB"},
            "fulfillments": [
                {"trackingCompany": "DHL", "trackingNumber": "OLD", "createdAt": "2024-05-02T10:00:00Z"},
                {"trackingCompany": "UPS", "trackingNumber": "1Z999", "trackingUrl": "https://ups.example/1Z999", "createdAt": "2024-05-03T10:00:00Z"}
            ]
        })
    }

    #[test]
    fn maps_full_payload() {
        let order = map_raw_order(&raw(full_payload())).unwrap();

        assert_eq!(order.id().as_str(), "gid://shop/Order/4521");
        assert_eq!(order.number().as_str(), "4521");
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.currency(), "EUR");
        assert_eq!(order.totals().total, Money::new(4490, "EUR"));
        assert_eq!(order.totals().shipping, Money::new(490, "EUR"));
        assert_eq!(order.customer().name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(order.customer().email.as_deref(), Some("ada@example.com"));
        assert_eq!(order.line_items().len(), 2);
        assert_eq!(order.line_items()[1].sku, None);
        assert_eq!(order.item_count(), 3);

        let shipping = order.shipping().unwrap();
        assert_eq!(shipping.carrier.as_deref(), Some("UPS"));
        assert_eq!(shipping.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(shipping.address.as_ref().unwrap().lines, vec!["1 Analytical St"]);
    }

    #[test]
    fn cancellation_dominates_other_statuses() {
        let mut payload = full_payload();
        payload["cancelledAt"] = serde_json::json!("2024-05-04T10:00:00Z");
        let order = map_raw_order(&raw(payload)).unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn minimal_payload_has_no_shipping_and_zero_subtotals() {
        let order = map_raw_order(&raw(serde_json::json!({
            "id": "gid://shop/Order/9",
            "name": "#9001",
            "email": "buyer@example.com",
            "createdAt": "2024-05-01T10:00:00Z",
            "currencyCode": "USD",
            "totalPrice": "10"
        })))
        .unwrap();

        assert_eq!(order.status(), OrderStatus::Open);
        assert!(order.shipping().is_none());
        assert_eq!(order.totals().tax, Money::zero("USD"));
        assert_eq!(order.customer().email.as_deref(), Some("buyer@example.com"));
        assert_eq!(order.customer().name, None);
    }

    #[test]
    fn rejects_negative_quantities_and_bad_amounts() {
        let mut payload = full_payload();
        payload["lineItems"][0]["quantity"] = serde_json::json!(-1);
        assert!(matches!(
            map_raw_order(&raw(payload)),
            Err(DomainError::Validation(_))
        ));

        let mut payload = full_payload();
        payload["totalPrice"] = serde_json::json!("n/a");
        assert!(map_raw_order(&raw(payload)).is_err());
    }

    #[test]
    fn item_count_does_not_overflow_on_huge_quantities() {
        let mut payload = full_payload();
        payload["lineItems"][0]["quantity"] = serde_json::json!(u32::MAX);
        payload["lineItems"][1]["quantity"] = serde_json::json!(u32::MAX);
        let order = map_raw_order(&raw(payload)).unwrap();
        assert_eq!(order.item_count(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), Some("ada@example.com".into()));
        assert_eq!(normalize_email("   "), None);
    }

    #[test]
    fn mapping_is_deterministic() {
        let input = raw(full_payload());
        assert_eq!(map_raw_order(&input).unwrap(), map_raw_order(&input).unwrap());
    }
}
