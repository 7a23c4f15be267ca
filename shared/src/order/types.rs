//! Order row types
//!
//! Field names on the wire follow the `orders` table columns; Rust names are
//! the domain names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::fulfillment::{self, FulfillmentKind};
use super::payment::PaymentMethod;
use crate::util::{lenient_vec, null_as_default, number_or_string, opt_number_or_string};

// ============================================================================
// Status
// ============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Not yet marked completed by kitchen/staff
    #[default]
    Pending,
    /// Ready; immutable except for historical display
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Items
// ============================================================================

/// A line item as ordered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Product name
    #[serde(rename = "burger_type")]
    pub product: String,
    /// Size / variant
    #[serde(rename = "patty_size", default, deserialize_with = "null_as_default")]
    pub size: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub combo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    /// Unit price, only present for storefront orders
    #[serde(
        default,
        deserialize_with = "opt_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
}

fn default_quantity() -> u32 {
    1
}

impl OrderItem {
    pub fn new(quantity: u32, product: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            quantity,
            product: product.into(),
            size: size.into(),
            combo: false,
            additions: None,
            removals: None,
            observations: None,
            price: None,
        }
    }

    pub fn with_combo(mut self, combo: bool) -> Self {
        self.combo = combo;
        self
    }

    /// "2x Doble Big (combo)"
    pub fn description(&self) -> String {
        let mut desc = format!("{}x {}", self.quantity, self.product);
        if !self.size.is_empty() {
            desc.push(' ');
            desc.push_str(&self.size);
        }
        if self.combo {
            desc.push_str(" (combo)");
        }
        desc
    }
}

/// Per-item completion flag, a projection of [`OrderItem`]
///
/// `item_status[i]` always describes `items[i]`; see [`super::tracking`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStatus {
    #[serde(rename = "burger_type")]
    pub product: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(rename = "patty_size", default, deserialize_with = "null_as_default")]
    pub size: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub combo: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
}

impl From<&OrderItem> for ItemStatus {
    fn from(item: &OrderItem) -> Self {
        Self {
            product: item.product.clone(),
            quantity: item.quantity,
            size: item.size.clone(),
            combo: item.combo,
            completed: false,
        }
    }
}

/// Standalone extra (drinks, sides) outside the item list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtraItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(
        default,
        deserialize_with = "opt_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<f64>,
}

// ============================================================================
// Order
// ============================================================================

/// An order row
///
/// `Option` fields serialize as `null` so that a full row can be turned into a
/// patch that clears columns the server cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Opaque stable identity
    pub id: String,
    /// Daily-reset display number, never used for identity or ordering
    #[serde(default, deserialize_with = "null_as_default")]
    pub order_number: u32,
    #[serde(rename = "nombre")]
    pub customer_name: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "monto", deserialize_with = "number_or_string")]
    pub total: f64,
    /// Payment method; may hold a JSON-encoded mixed payment list
    #[serde(rename = "metodo_pago", default)]
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "hora_programada", default)]
    pub scheduled_time: Option<String>,
    #[serde(rename = "direccion_envio", default)]
    pub delivery_address: Option<String>,
    #[serde(rename = "paga_con", default, deserialize_with = "opt_number_or_string")]
    pub cash_tendered: Option<f64>,
    #[serde(rename = "vuelto", default, deserialize_with = "opt_number_or_string")]
    pub change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub item_status: Option<Vec<ItemStatus>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub extras: Option<Vec<ExtraItem>>,
    /// Courier departed (delivery) / ready for pickup (pickup)
    #[serde(rename = "cadete_salio", default, deserialize_with = "null_as_default")]
    pub courier_departed: bool,
    #[serde(default)]
    pub status: OrderStatus,
}

impl Order {
    /// A new pending order with no items and no optional columns
    pub fn new(
        id: impl Into<String>,
        order_number: u32,
        customer_name: impl Into<String>,
        total: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            order_number,
            customer_name: customer_name.into(),
            phone: None,
            total,
            payment_method: None,
            created_at,
            scheduled_time: None,
            delivery_address: None,
            cash_tendered: None,
            change: None,
            items: None,
            item_status: None,
            extras: None,
            courier_departed: false,
            status: OrderStatus::Pending,
        }
    }

    /// Set the item list and a fresh, all-uncompleted status list
    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.item_status = Some(super::tracking::initial_item_status(&items));
        self.items = Some(items);
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.delivery_address = Some(address.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// Pickup when the address is absent or a recognised in-store marker
    pub fn is_pickup(&self) -> bool {
        fulfillment::is_pickup_address(self.delivery_address.as_deref())
    }

    pub fn fulfillment(&self) -> FulfillmentKind {
        FulfillmentKind::for_address(self.delivery_address.as_deref())
    }

    pub fn payment(&self) -> PaymentMethod {
        PaymentMethod::parse(self.payment_method.as_deref())
    }

    /// Number of line items (0 when the item list is absent)
    pub fn item_count(&self) -> usize {
        self.items.as_ref().map_or(0, Vec::len)
    }
}
