//! In-process store and change feed
//!
//! Backs tests and offline demos. Writes are broadcast to live subscribers as
//! row changes, the same way the hosted feed echoes them. Faults can be
//! injected to exercise reconnect and revert paths.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use shared::{FeedMessage, Order, OrderPatch, RowChange};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ChangeFeed, FeedSubscription, OrderQuery, OrderStore};
use crate::error::{StoreError, StoreResult};

struct Subscriber {
    table: String,
    tx: mpsc::UnboundedSender<FeedMessage>,
}

#[derive(Default)]
struct Faults {
    offline: bool,
    failing_writes: u32,
    hold_confirmations: bool,
    write_delay: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Order>,
    subscribers: HashMap<Uuid, Subscriber>,
    /// Subscriptions waiting for an explicit confirmation
    unconfirmed: Vec<Uuid>,
    daily: Option<(NaiveDate, u32)>,
    faults: Faults,
}

impl Inner {
    fn broadcast(&mut self, table: &str, change: RowChange) {
        self.subscribers.retain(|_, sub| {
            sub.table != table || sub.tx.send(FeedMessage::Change(change.clone())).is_ok()
        });
    }

    /// Send a terminal message to every subscriber and drop them
    fn terminate_all(&mut self, message: FeedMessage) {
        for (_, sub) in self.subscribers.drain() {
            let _ = sub.tx.send(message.clone());
        }
        self.unconfirmed.clear();
    }

    fn check_write(&mut self) -> StoreResult<()> {
        if self.faults.offline {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        if self.faults.failing_writes > 0 {
            self.faults.failing_writes -= 1;
            return Err(StoreError::Status {
                status: 503,
                message: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Order table and change feed held in memory
pub struct MemoryOrderStore {
    table: String,
    timezone: Tz,
    inner: Mutex<Inner>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            table: "orders".to_string(),
            timezone: chrono_tz::America::Argentina::Buenos_Aires,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Insert rows directly, without emitting change events
    pub fn seed(&self, orders: impl IntoIterator<Item = Order>) {
        let mut inner = self.inner.lock();
        for order in orders {
            inner.rows.retain(|r| r.id != order.id);
            inner.rows.push(order);
        }
    }

    pub fn rows(&self) -> Vec<Order> {
        self.inner.lock().rows.clone()
    }

    pub fn row(&self, id: &str) -> Option<Order> {
        self.inner.lock().rows.iter().find(|r| r.id == id).cloned()
    }

    /// Live subscription count
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Take the store offline (reads, writes and subscribes fail). Live
    /// subscriptions receive a channel error and are dropped.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.inner.lock();
        inner.faults.offline = offline;
        if offline {
            inner.terminate_all(FeedMessage::ChannelError("store offline".to_string()));
        }
    }

    /// Close every live subscription without failing the store
    pub fn drop_connections(&self) {
        self.inner.lock().terminate_all(FeedMessage::Closed);
    }

    /// Time out every live subscription
    pub fn time_out_connections(&self) {
        self.inner.lock().terminate_all(FeedMessage::TimedOut);
    }

    /// Fail the next `n` writes with a 503
    pub fn fail_next_writes(&self, n: u32) {
        self.inner.lock().faults.failing_writes = n;
    }

    /// Delay every write by `delay` before it is applied
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.inner.lock().faults.write_delay = delay;
    }

    /// Hold new subscriptions unconfirmed until [`Self::confirm_subscriptions`]
    pub fn hold_confirmations(&self, hold: bool) {
        self.inner.lock().faults.hold_confirmations = hold;
    }

    /// Confirm held subscriptions
    pub fn confirm_subscriptions(&self) {
        let mut inner = self.inner.lock();
        let held = std::mem::take(&mut inner.unconfirmed);
        for id in held {
            if let Some(sub) = inner.subscribers.get(&id) {
                let _ = sub.tx.send(FeedMessage::Subscribed);
            }
        }
    }

    /// Deliver a raw message to every subscriber
    pub fn push_raw(&self, message: FeedMessage) {
        let inner = self.inner.lock();
        for sub in inner.subscribers.values() {
            let _ = sub.tx.send(message.clone());
        }
    }

    async fn write_delay(&self) {
        let delay = self.inner.lock().faults.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn select(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let inner = self.inner.lock();
        if inner.faults.offline {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        let mut rows: Vec<Order> = inner
            .rows
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        if query.newest_first {
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        } else {
            rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, order: &Order) -> StoreResult<Order> {
        self.write_delay().await;
        let mut inner = self.inner.lock();
        inner.check_write()?;
        if inner.rows.iter().any(|r| r.id == order.id) {
            return Err(StoreError::Status {
                status: 409,
                message: format!("duplicate id {}", order.id),
            });
        }
        inner.rows.push(order.clone());
        inner.broadcast(&self.table, RowChange::insert(&self.table, order));
        Ok(order.clone())
    }

    async fn update(&self, id: &str, patch: &OrderPatch) -> StoreResult<()> {
        self.write_delay().await;
        let mut inner = self.inner.lock();
        inner.check_write()?;
        let Some(pos) = inner.rows.iter().position(|r| r.id == id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let updated = patch
            .apply_to(&inner.rows[pos])
            .map_err(|e| StoreError::Status {
                status: 400,
                message: e.to_string(),
            })?;
        inner.rows[pos] = updated.clone();
        inner.broadcast(&self.table, RowChange::update(&self.table, &updated));
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.write_delay().await;
        let mut inner = self.inner.lock();
        inner.check_write()?;
        let before = inner.rows.len();
        inner.rows.retain(|r| r.id != id);
        if inner.rows.len() != before {
            inner.broadcast(&self.table, RowChange::delete(&self.table, id));
        }
        Ok(())
    }

    async fn next_order_number(&self) -> StoreResult<u32> {
        let today = Utc::now().with_timezone(&self.timezone).date_naive();
        let mut inner = self.inner.lock();
        if inner.faults.offline {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        let next = match inner.daily {
            Some((day, n)) if day == today => n + 1,
            _ => 1,
        };
        inner.daily = Some((today, next));
        Ok(next)
    }
}

#[async_trait]
impl ChangeFeed for MemoryOrderStore {
    async fn subscribe(&self, table: &str) -> StoreResult<FeedSubscription> {
        let mut inner = self.inner.lock();
        if inner.faults.offline {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        if inner.faults.hold_confirmations {
            inner.unconfirmed.push(id);
        } else {
            let _ = tx.send(FeedMessage::Subscribed);
        }
        inner.subscribers.insert(
            id,
            Subscriber {
                table: table.to_string(),
                tx,
            },
        );
        tracing::debug!(subscription = %id, table = %table, "Memory feed subscribed");
        Ok(FeedSubscription { id, messages: rx })
    }

    async fn unsubscribe(&self, id: Uuid) {
        let mut inner = self.inner.lock();
        inner.subscribers.remove(&id);
        inner.unconfirmed.retain(|u| *u != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ChangeKind, OrderStatus};

    fn order(id: &str, minutes_ago: i64) -> Order {
        Order::new(id, 1, "Ana", 1000.0, Utc::now() - chrono::Duration::minutes(minutes_ago))
    }

    #[tokio::test]
    async fn test_writes_are_echoed_to_subscribers() {
        let store = MemoryOrderStore::new();
        let mut sub = store.subscribe("orders").await.unwrap();
        assert_eq!(sub.messages.recv().await, Some(FeedMessage::Subscribed));

        store.insert(&order("a", 0)).await.unwrap();
        store
            .update("a", &OrderPatch::new().status(OrderStatus::Completed))
            .await
            .unwrap();
        store.delete("a").await.unwrap();

        let kinds: Vec<ChangeKind> = (0..3)
            .map(|_| match sub.messages.try_recv() {
                Ok(FeedMessage::Change(c)) => c.kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]);
    }

    #[tokio::test]
    async fn test_select_orders_and_limits() {
        let store = MemoryOrderStore::new();
        store.seed([order("old", 30), order("new", 1), order("mid", 10)]);

        let rows = store.select(&OrderQuery::new()).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        let query = OrderQuery {
            newest_first: false,
            limit: Some(1),
            ..OrderQuery::new()
        };
        assert_eq!(store.select(&query).await.unwrap()[0].id, "old");
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryOrderStore::new();
        store.seed([order("a", 0)]);
        let mut sub = store.subscribe("orders").await.unwrap();
        let _ = sub.messages.recv().await;

        store.fail_next_writes(1);
        let patch = OrderPatch::new().courier_departed(true);
        assert!(store.update("a", &patch).await.is_err());
        assert!(store.update("a", &patch).await.is_ok());

        store.set_offline(true);
        let mut last = None;
        while let Ok(msg) = sub.messages.try_recv() {
            last = Some(msg);
        }
        assert!(matches!(last, Some(FeedMessage::ChannelError(_))));
        assert_eq!(store.subscription_count(), 0);
        assert!(store.subscribe("orders").await.is_err());
    }

    #[tokio::test]
    async fn test_daily_number_increments() {
        let store = MemoryOrderStore::new();
        assert_eq!(store.next_order_number().await.unwrap(), 1);
        assert_eq!(store.next_order_number().await.unwrap(), 2);
    }
}
