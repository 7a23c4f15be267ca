//! Customer-facing order status
//!
//! Answers "where is my order #n" for today's order with that number.

use serde::{Deserialize, Serialize};
use shared::order::tracking;
use shared::{Order, OrderStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub found: bool,
    pub order_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(rename = "cadete_salio")]
    pub courier_departed: bool,
    #[serde(rename = "listo_para_retirar")]
    pub ready_for_pickup: bool,
    #[serde(rename = "es_retiro")]
    pub is_pickup: bool,
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(rename = "direccion_envio", skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    /// Kitchen progress as (done, total) items, when the order tracks items
    #[serde(rename = "items_listos", skip_serializing_if = "Option::is_none")]
    pub progress: Option<(usize, usize)>,
    pub message: String,
}

impl StatusReport {
    pub fn not_found(order_number: u32) -> Self {
        Self {
            found: false,
            order_number,
            status: None,
            courier_departed: false,
            ready_for_pickup: false,
            is_pickup: false,
            customer_name: None,
            delivery_address: None,
            progress: None,
            message: format!("No se encontró el pedido #{order_number} de hoy"),
        }
    }

    pub fn for_order(order: &Order) -> Self {
        let n = order.order_number;
        let pickup = order.is_pickup();
        let message = match (order.courier_departed, pickup, order.status) {
            (true, true, _) => format!("El pedido #{n} está listo para retirar en el local"),
            (true, false, _) => format!("El cadete ya salió con el pedido #{n}"),
            (false, true, OrderStatus::Completed) => format!("El pedido #{n} está listo"),
            (false, false, OrderStatus::Completed) => {
                format!("El pedido #{n} está listo pero el cadete aún no salió")
            }
            (false, _, OrderStatus::Pending) => format!("El pedido #{n} está en preparación"),
        };

        Self {
            found: true,
            order_number: n,
            status: Some(order.status),
            courier_departed: order.courier_departed,
            ready_for_pickup: pickup && order.courier_departed,
            is_pickup: pickup,
            customer_name: Some(order.customer_name.clone()),
            delivery_address: order.delivery_address.clone(),
            progress: tracking::progress(order),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(address: &str) -> Order {
        Order::new("a", 21, "Ana", 1.0, Utc::now()).with_address(address)
    }

    #[test]
    fn test_messages() {
        let mut delivery = order("Belgrano 100");
        assert_eq!(
            StatusReport::for_order(&delivery).message,
            "El pedido #21 está en preparación"
        );

        delivery.status = OrderStatus::Completed;
        assert_eq!(
            StatusReport::for_order(&delivery).message,
            "El pedido #21 está listo pero el cadete aún no salió"
        );

        delivery.courier_departed = true;
        let report = StatusReport::for_order(&delivery);
        assert_eq!(report.message, "El cadete ya salió con el pedido #21");
        assert!(!report.ready_for_pickup);

        let mut pickup = order("retiro");
        pickup.status = OrderStatus::Completed;
        assert_eq!(StatusReport::for_order(&pickup).message, "El pedido #21 está listo");
        pickup.courier_departed = true;
        let report = StatusReport::for_order(&pickup);
        assert_eq!(report.message, "El pedido #21 está listo para retirar en el local");
        assert!(report.ready_for_pickup);
        assert!(report.is_pickup);
    }

    #[test]
    fn test_progress_counts_completed_items() {
        let mut order = Order::new("a", 4, "Ana", 1.0, Utc::now()).with_items(vec![
            shared::OrderItem::new(1, "Clásica", "simple"),
            shared::OrderItem::new(1, "Bacon", "doble"),
        ]);
        assert_eq!(StatusReport::for_order(&order).progress, Some((0, 2)));

        if let Some(status) = order.item_status.as_mut() {
            status[0].completed = true;
        }
        let value = serde_json::to_value(StatusReport::for_order(&order)).unwrap();
        assert_eq!(value["items_listos"], serde_json::json!([1, 2]));

        assert_eq!(StatusReport::for_order(&Order::new("b", 5, "Ana", 1.0, Utc::now())).progress, None);
    }

    #[test]
    fn test_not_found_shape() {
        let report = StatusReport::not_found(3);
        assert!(!report.found);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["message"], "No se encontró el pedido #3 de hoy");
        assert!(value.get("status").is_none());
        assert!(value.get("items_listos").is_none());
        assert_eq!(value["es_retiro"], false);
    }
}
