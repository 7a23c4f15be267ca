//! Remote order store and change feed
//!
//! The hosted database is consumed through two seams:
//! - [`OrderStore`]: point queries and single-row writes
//! - [`ChangeFeed`]: row-level change subscription with a status stream

mod memory;
mod rest;

pub use memory::MemoryOrderStore;
pub use rest::RestOrderStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{FeedMessage, Order, OrderPatch, OrderStatus};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::StoreResult;

/// Row filter and ordering for [`OrderStore::select`]
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub order_number: Option<u32>,
    /// `created_at >= since`
    pub created_since: Option<DateTime<Utc>>,
    /// Order by `created_at` descending (default) or ascending
    pub newest_first: bool,
    pub limit: Option<usize>,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            order_number: None,
            created_since: None,
            newest_first: true,
            limit: None,
        }
    }
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows with `status`, newest first
    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Latest row carrying `number` created at or after `since`
    pub fn latest_numbered(number: u32, since: DateTime<Utc>) -> Self {
        Self {
            order_number: Some(number),
            created_since: Some(since),
            limit: Some(1),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| order.status == s)
            && self.order_number.is_none_or(|n| order.order_number == n)
            && self.created_since.is_none_or(|t| order.created_at >= t)
    }
}

/// Durable order table
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn select(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;

    /// Insert a new row, returning it as stored
    async fn insert(&self, order: &Order) -> StoreResult<Order>;

    /// Single-row update of the patched columns
    async fn update(&self, id: &str, patch: &OrderPatch) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Allocate the next daily-reset display number
    async fn next_order_number(&self) -> StoreResult<u32>;
}

/// Live subscription handle
///
/// The first message is [`FeedMessage::Subscribed`] once the transport
/// confirms; a failure message or a closed channel ends the subscription.
#[derive(Debug)]
pub struct FeedSubscription {
    pub id: Uuid,
    pub messages: mpsc::UnboundedReceiver<FeedMessage>,
}

/// Row change feed
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: &str) -> StoreResult<FeedSubscription>;

    /// Release a subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, id: Uuid);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let q = OrderQuery::with_status(OrderStatus::Pending);
        assert!(q.newest_first);
        assert_eq!(q.limit, None);

        let since = Utc::now();
        let q = OrderQuery::latest_numbered(7, since);
        assert_eq!(q.order_number, Some(7));
        assert_eq!(q.limit, Some(1));
        assert_eq!(q.created_since, Some(since));
    }
}
