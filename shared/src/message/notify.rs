//! Order status notification
//!
//! Posted to the notification webhook when staff dispatch an order (courier
//! departed or ready for pickup).

use serde::{Deserialize, Serialize};

use crate::order::{DispatchState, FulfillmentKind, Order};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub order_number: u32,
    #[serde(rename = "nombre")]
    pub customer_name: String,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: FulfillmentKind,
    #[serde(rename = "estado")]
    pub state: DispatchState,
    #[serde(rename = "direccion_envio")]
    pub delivery_address: Option<String>,
}

impl NotifyPayload {
    pub fn for_order(order: &Order) -> Self {
        let kind = order.fulfillment();
        Self {
            order_number: order.order_number,
            customer_name: order.customer_name.clone(),
            phone: order.phone.clone(),
            kind,
            state: kind.dispatch_state(),
            delivery_address: order.delivery_address.clone(),
        }
    }
}
