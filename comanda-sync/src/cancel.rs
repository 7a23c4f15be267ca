//! Cancellation window
//!
//! Orders can be cancelled only shortly after they were placed; after that
//! the kitchen has started and the request is rejected with a reason.

use chrono::{DateTime, Utc};
use shared::Order;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Result of a successful cancellation
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    pub order_id: String,
    pub order_number: u32,
    pub customer_name: String,
}

impl From<&Order> for Cancellation {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            order_number: order.order_number,
            customer_name: order.customer_name.clone(),
        }
    }
}

/// Reject orders older than `window`
pub fn check_window(order: &Order, now: DateTime<Utc>, window: Duration) -> SyncResult<()> {
    // Future timestamps (clock skew) count as age zero
    let age = now
        .signed_duration_since(order.created_at)
        .to_std()
        .unwrap_or_default();
    if age > window {
        return Err(SyncError::rejected(format!(
            "El pedido #{} tiene más de {} minutos y no puede cancelarse",
            order.order_number,
            window.as_secs() / 60
        )));
    }
    Ok(())
}
