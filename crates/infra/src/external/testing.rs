//! Scripted client double for worker and lookup tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use orderlink_core::OrderNumber;
use orderlink_orders::RawOrder;

use super::{ExternalApiError, ExternalOrderClient};

/// Serves orders from a fixed catalogue.
///
/// Each call first pops one scripted outcome: a queued failure is returned
/// as-is, a queued pass (or an empty script) falls through to the catalogue.
/// Email lookups match the catalogue exactly, as the upstream does.
#[derive(Debug, Default)]
pub struct ScriptedOrderClient {
    by_number: Mutex<HashMap<String, RawOrder>>,
    script: Mutex<VecDeque<Option<ExternalApiError>>>,
    calls: AtomicUsize,
    email_queries: Mutex<Vec<String>>,
}

impl ScriptedOrderClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(self, raw: RawOrder) -> Self {
        let key = raw.name.trim_start_matches('#').to_string();
        self.by_number.lock().unwrap().insert(key, raw);
        self
    }

    pub fn fail_next(&self, error: ExternalApiError) {
        self.script.lock().unwrap().push_back(Some(error));
    }

    pub fn pass_next(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Emails passed to `get_orders_by_email`, in call order.
    pub fn email_queries(&self) -> Vec<String> {
        self.email_queries.lock().unwrap().clone()
    }

    fn begin_call(&self) -> Result<(), ExternalApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front().flatten() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExternalOrderClient for ScriptedOrderClient {
    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<RawOrder>, ExternalApiError> {
        self.begin_call()?;
        Ok(self.by_number.lock().unwrap().get(number.as_str()).cloned())
    }

    async fn get_orders_by_email(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<RawOrder>, ExternalApiError> {
        self.email_queries.lock().unwrap().push(email.to_string());
        self.begin_call()?;
        let mut orders: Vec<RawOrder> = self
            .by_number
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.email.as_deref() == Some(email))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit);
        Ok(orders)
    }
}

/// Minimal valid upstream payload.
pub fn raw_order(number: &str, email: &str, created_at: &str) -> RawOrder {
    serde_json::from_value(serde_json::json!({
        "id": format!("gid://shop/Order/{number}"),
        "name": format!("#{number}"),
        "email": email,
        "createdAt": created_at,
        "displayFinancialStatus": "PAID",
        "displayFulfillmentStatus": "UNFULFILLED",
        "currencyCode": "EUR",
        "totalPrice": "25.00",
        "lineItems": [{"title": "Mug", "quantity": 1, "unitPrice": "25.00"}]
    }))
    .unwrap()
}
