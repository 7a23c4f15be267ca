//! Order intake
//!
//! Validates a storefront / manual-entry request and builds the pending row.
//! Field names follow the intake payload the storefront posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::order::tracking;
use shared::util::{number_or_string, opt_number_or_string};
use shared::{ExtraItem, Order, OrderItem, OrderStatus, PaymentMethod, PaymentPart};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// Payment as submitted: a method name or a list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentInput {
    Method(String),
    Mixed(Vec<PaymentPart>),
}

impl From<PaymentInput> for PaymentMethod {
    fn from(input: PaymentInput) -> Self {
        match input {
            PaymentInput::Method(method) if method.trim().is_empty() => PaymentMethod::default(),
            PaymentInput::Method(method) => PaymentMethod::Single(method.trim().to_string()),
            PaymentInput::Mixed(parts) if parts.is_empty() => PaymentMethod::default(),
            PaymentInput::Mixed(parts) => PaymentMethod::Mixed(parts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    #[serde(rename = "nombre", default)]
    pub customer_name: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub extras: Vec<ExtraItem>,
    #[serde(rename = "monto", deserialize_with = "number_or_string")]
    pub amount: f64,
    #[serde(rename = "direccion_envio", default)]
    pub delivery_address: Option<String>,
    #[serde(rename = "metodo_pago", default)]
    pub payment: Option<PaymentInput>,
    #[serde(rename = "hora_programada", default)]
    pub scheduled_time: Option<String>,
    #[serde(rename = "paga_con", default, deserialize_with = "opt_number_or_string")]
    pub cash_tendered: Option<f64>,
    #[serde(rename = "vuelto", default, deserialize_with = "opt_number_or_string")]
    pub change: Option<f64>,
}

impl NewOrderRequest {
    pub fn new(customer_name: impl Into<String>, items: Vec<OrderItem>, amount: f64) -> Self {
        Self {
            customer_name: customer_name.into(),
            phone: None,
            items,
            extras: Vec::new(),
            amount,
            delivery_address: None,
            payment: None,
            scheduled_time: None,
            cash_tendered: None,
            change: None,
        }
    }

    /// Reject requests missing required fields
    pub fn validate(&self) -> SyncResult<()> {
        if self.customer_name.trim().is_empty() {
            return Err(SyncError::validation("El nombre es obligatorio"));
        }
        if self.items.is_empty() {
            return Err(SyncError::validation("El pedido no tiene items"));
        }
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(SyncError::validation("El monto debe ser mayor a cero"));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.product.trim().is_empty() {
                return Err(SyncError::validation(format!("Item {} sin producto", i + 1)));
            }
            if item.quantity == 0 {
                return Err(SyncError::validation(format!("Item {} sin cantidad", i + 1)));
            }
        }
        Ok(())
    }

    /// Pending row with a fresh id. Call [`Self::validate`] first.
    pub fn build_order(self, order_number: u32, now: DateTime<Utc>) -> Order {
        let payment: PaymentMethod = self.payment.map(Into::into).unwrap_or_default();
        let item_status = tracking::initial_item_status(&self.items);

        Order {
            id: Uuid::new_v4().to_string(),
            order_number,
            customer_name: self.customer_name.trim().to_string(),
            phone: non_blank(self.phone),
            total: self.amount,
            payment_method: Some(payment.to_stored()),
            created_at: now,
            scheduled_time: non_blank(self.scheduled_time),
            delivery_address: non_blank(self.delivery_address),
            cash_tendered: self.cash_tendered,
            change: self.change,
            items: Some(self.items),
            item_status: Some(item_status),
            extras: (!self.extras.is_empty()).then_some(self.extras),
            courier_departed: false,
            status: OrderStatus::Pending,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
