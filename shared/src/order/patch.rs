//! Shallow order patches
//!
//! A patch is a set of top-level columns using the wire names. The same patch
//! is merged into the local cache and sent as the body of the remote
//! single-row update, so optimistic and confirmed changes carry identical
//! fields. Columns not named in a patch are preserved on merge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{ItemStatus, Order, OrderStatus};

/// Identity column, never overwritten by a merge
const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderPatch(Map<String, Value>);

impl OrderPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every column of a full row except the identity.
    pub fn from_row(order: &Order) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(order)? {
            Value::Object(mut map) => {
                map.remove(ID_COLUMN);
                Ok(Self(map))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn status(self, status: OrderStatus) -> Self {
        self.set("status", Value::String(status.as_str().to_string()))
    }

    pub fn item_status(self, statuses: &[ItemStatus]) -> Self {
        // Plain derive structs always serialize
        let value = serde_json::to_value(statuses).unwrap_or(Value::Null);
        self.set("item_status", value)
    }

    pub fn courier_departed(self, departed: bool) -> Self {
        self.set("cadete_salio", Value::Bool(departed))
    }

    /// Set an arbitrary column. The identity column is ignored.
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        let column = column.into();
        if column != ID_COLUMN {
            self.0.insert(column, value);
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merge into `order`, producing a new order.
    ///
    /// Fails when the merged row no longer deserializes (e.g. a malformed
    /// status); the caller keeps the original order in that case.
    pub fn apply_to(&self, order: &Order) -> Result<Order, serde_json::Error> {
        let mut row = match serde_json::to_value(order)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (column, value) in &self.0 {
            row.insert(column.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderItem, tracking};
    use chrono::Utc;

    fn order() -> Order {
        let items = vec![OrderItem::new(1, "A", "simple"), OrderItem::new(1, "B", "simple")];
        Order {
            id: "o1".into(),
            order_number: 7,
            customer_name: "Ana".into(),
            phone: Some("11".into()),
            total: 1000.0,
            payment_method: Some("efectivo".into()),
            created_at: Utc::now(),
            scheduled_time: None,
            delivery_address: Some("retira".into()),
            cash_tendered: None,
            change: None,
            item_status: Some(tracking::initial_item_status(&items)),
            items: Some(items),
            extras: None,
            courier_departed: false,
            status: OrderStatus::Pending,
        }
    }

    #[test]
    fn test_apply_preserves_unspecified_columns() {
        let base = order();
        let merged = OrderPatch::new().courier_departed(true).apply_to(&base).unwrap();
        assert!(merged.courier_departed);
        assert_eq!(merged.customer_name, "Ana");
        assert_eq!(merged.item_status, base.item_status);
    }

    #[test]
    fn test_patches_compose_without_clobbering() {
        let base = order();
        let toggled = tracking::toggled(&base, 0).unwrap();
        let optimistic = OrderPatch::new().item_status(&toggled);
        let confirmed = OrderPatch::new().courier_departed(true);

        let after = confirmed
            .apply_to(&optimistic.apply_to(&base).unwrap())
            .unwrap();
        assert!(after.item_status.as_ref().unwrap()[0].completed);
        assert!(after.courier_departed);
    }

    #[test]
    fn test_identity_is_never_patched() {
        let patch = OrderPatch::new().set("id", Value::String("other".into()));
        assert!(patch.is_empty());

        let from_row = OrderPatch::from_row(&order()).unwrap();
        assert!(from_row.get("id").is_none());
        assert!(from_row.get("nombre").is_some());
    }

    #[test]
    fn test_row_patch_clears_nulled_columns() {
        let base = order();
        let mut server = base.clone();
        server.phone = None;
        let merged = OrderPatch::from_row(&server).unwrap().apply_to(&base).unwrap();
        assert!(merged.phone.is_none());
    }

    #[test]
    fn test_malformed_merge_fails() {
        let patch = OrderPatch::new().set("status", Value::String("weird".into()));
        assert!(patch.apply_to(&order()).is_err());
    }

    #[test]
    fn test_status_wire_shape() {
        let patch = OrderPatch::new().status(OrderStatus::Completed);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"status": "completed"})
        );
    }
}
