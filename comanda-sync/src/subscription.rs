//! Change subscription manager
//!
//! Keeps one live subscription to the order table's change feed and routes
//! row changes into the [`OrderCache`].
//!
//! # Supervisor loop
//!
//! ```text
//! loop:
//!   status = connecting, subscribe
//!   session: select { shutdown | forced reconnect | feed message }
//!     Subscribed → status = connected (+ catch-up resync after a failure)
//!     Change     → cache
//!     failure    → unsubscribe, status = disconnected
//!   wait: select { shutdown | fixed delay | forced reconnect }
//! ```
//!
//! Only one retry is ever scheduled: the wait phase is the retry, and a
//! forced reconnect cuts it short instead of adding a second one.

use parking_lot::Mutex;
use shared::{ChangeKind, ChannelStatus, FeedMessage, OrderStatus, RowChange};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::OrderCache;
use crate::error::StoreResult;
use crate::notice::{Notice, NoticeBus};
use crate::store::{ChangeFeed, FeedSubscription, OrderQuery, OrderStore};

/// Visibility of the consuming surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

enum SessionEnd {
    Shutdown,
    Reconnect,
    Failed(String),
}

pub struct SubscriptionManager {
    feed: Arc<dyn ChangeFeed>,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    notices: NoticeBus,
    table: String,
    reconnect_delay: Duration,
    visibility_threshold: Duration,
    status: watch::Sender<ChannelStatus>,
    reconnect: Notify,
    /// Bumped by every forced reconnect
    generation: AtomicU64,
    /// Set after any interruption; the next confirmation triggers a resync
    catch_up_pending: AtomicBool,
    hidden_since: Mutex<Option<Instant>>,
}

impl SubscriptionManager {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        notices: NoticeBus,
        table: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            feed,
            store,
            cache,
            notices,
            table: table.into(),
            reconnect_delay: Duration::from_secs(3),
            visibility_threshold: Duration::from_secs(10),
            status,
            reconnect: Notify::new(),
            generation: AtomicU64::new(0),
            catch_up_pending: AtomicBool::new(false),
            hidden_since: Mutex::new(None),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_visibility_threshold(mut self, threshold: Duration) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, next: ChannelStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            tracing::debug!(table = %self.table, status = %next, "Change feed status");
        }
    }

    /// Request a resync on the next subscription confirmation
    pub fn request_catch_up(&self) {
        self.catch_up_pending.store(true, Ordering::SeqCst);
    }

    /// Tear down the current subscription (or pending retry) and subscribe
    /// again right away.
    pub fn connect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.set_status(ChannelStatus::Connecting);
        self.reconnect.notify_one();
    }

    /// Supervisor loop; returns after `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(table = %self.table, "Change feed supervisor started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let generation = self.generation.load(Ordering::SeqCst);
            self.set_status(ChannelStatus::Connecting);

            let subscribed = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.feed.subscribe(&self.table) => result,
            };
            let end = match subscribed {
                Ok(subscription) => self.run_session(subscription, generation, &shutdown).await,
                Err(e) => SessionEnd::Failed(e.to_string()),
            };

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Reconnect => {
                    tracing::info!(table = %self.table, "Forced change feed reconnect");
                    self.request_catch_up();
                }
                SessionEnd::Failed(reason) => {
                    self.request_catch_up();
                    self.set_status(ChannelStatus::Disconnected);
                    tracing::warn!(
                        table = %self.table,
                        reason = %reason,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "Change feed disconnected, retrying"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                        _ = self.reconnect.notified() => {}
                    }
                }
            }
        }

        self.set_status(ChannelStatus::Disconnected);
        tracing::info!(table = %self.table, "Change feed supervisor stopped");
    }

    async fn run_session(
        &self,
        mut subscription: FeedSubscription,
        generation: u64,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let end = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break SessionEnd::Shutdown,
                _ = self.reconnect.notified() => {
                    if self.generation.load(Ordering::SeqCst) != generation {
                        break SessionEnd::Reconnect;
                    }
                }
                message = subscription.messages.recv() => match message {
                    Some(FeedMessage::Subscribed) => self.on_subscribed().await,
                    Some(FeedMessage::Change(change)) => self.handle_change(change),
                    Some(failure) => {
                        break SessionEnd::Failed(failure.failure_reason().unwrap_or_default());
                    }
                    None => break SessionEnd::Failed("feed closed".to_string()),
                },
            }
        };
        self.feed.unsubscribe(subscription.id).await;
        end
    }

    async fn on_subscribed(&self) {
        self.set_status(ChannelStatus::Connected);
        tracing::info!(table = %self.table, "Change feed subscribed");

        if self.catch_up_pending.swap(false, Ordering::SeqCst)
            && let Err(e) = self.resync().await
        {
            tracing::warn!(table = %self.table, error = %e, "Catch-up resync failed");
            self.request_catch_up();
        }
    }

    /// Route one row change into the cache. Malformed payloads are logged
    /// and dropped.
    pub fn handle_change(&self, change: RowChange) {
        if !change.table.is_empty() && change.table != self.table {
            tracing::debug!(table = %change.table, "Ignoring change for another table");
            return;
        }

        match change.kind {
            ChangeKind::Insert => match change.new_order() {
                Ok(order) if order.status == OrderStatus::Pending => {
                    let notice = Notice::new_order(&order);
                    let order_id = order.id.clone();
                    if self.cache.upsert_pending(order) {
                        tracing::debug!(order_id = %order_id, "New pending order");
                        self.notices.publish(notice);
                    }
                }
                Ok(order) => {
                    tracing::debug!(order_id = %order.id, status = %order.status, "Ignoring non-pending insert");
                }
                Err(e) => {
                    tracing::warn!(kind = %change.kind, error = %e, "Dropping malformed change payload");
                }
            },
            ChangeKind::Update => match change.new_order() {
                Ok(order) => {
                    let order_id = order.id.clone();
                    let outcome = self.cache.apply_row(order);
                    tracing::debug!(order_id = %order_id, outcome = ?outcome, "Order updated");
                }
                Err(e) => {
                    tracing::warn!(kind = %change.kind, error = %e, "Dropping malformed change payload");
                }
            },
            ChangeKind::Delete => match change.row_id() {
                Some(id) => {
                    if self.cache.remove(id) {
                        tracing::debug!(order_id = %id, "Order removed");
                    }
                }
                None => {
                    tracing::warn!(kind = %change.kind, "Dropping delete without identity");
                }
            },
        }
    }

    /// Track the consuming surface. Returns `true` when becoming visible
    /// forced a reconnect; the full resync runs once the new subscription is
    /// confirmed, so no older fetch can land on top of its events.
    pub async fn set_visibility(&self, visibility: Visibility) -> bool {
        match visibility {
            Visibility::Hidden => {
                self.hidden_since.lock().get_or_insert_with(Instant::now);
                false
            }
            Visibility::Visible => {
                let since = self.hidden_since.lock().take();
                let Some(since) = since else {
                    return false;
                };
                let hidden_for = since.elapsed();
                if hidden_for <= self.visibility_threshold {
                    return false;
                }
                tracing::info!(
                    hidden_ms = hidden_for.as_millis() as u64,
                    "Visible after long suspension, reconnecting"
                );
                self.request_catch_up();
                self.connect();
                true
            }
        }
    }

    /// Replace both cache collections with the store's current rows
    pub async fn resync(&self) -> StoreResult<()> {
        let pending = self
            .store
            .select(&OrderQuery::with_status(OrderStatus::Pending))
            .await?;
        let completed = self
            .store
            .select(&OrderQuery::with_status(OrderStatus::Completed))
            .await?;
        tracing::info!(
            pending = pending.len(),
            completed = completed.len(),
            "Cache resynchronized"
        );
        self.cache.replace(Some(pending), Some(completed));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryOrderStore;
    use chrono::Utc;
    use serde_json::json;
    use shared::{Order, OrderItem};

    fn manager() -> (Arc<MemoryOrderStore>, Arc<OrderCache>, SubscriptionManager) {
        let store = Arc::new(MemoryOrderStore::new());
        let cache = Arc::new(OrderCache::new());
        let manager = SubscriptionManager::new(
            store.clone(),
            store.clone(),
            cache.clone(),
            NoticeBus::new(16),
            "orders",
        );
        (store, cache, manager)
    }

    #[test]
    fn test_duplicate_insert_notifies_once() {
        let (_, cache, manager) = manager();
        let mut notices = manager.notices.subscribe();
        let order = Order::new("a", 1, "Ana", 100.0, Utc::now());

        manager.handle_change(RowChange::insert("orders", &order));
        manager.handle_change(RowChange::insert("orders", &order));

        assert_eq!(cache.pending().len(), 1);
        assert!(notices.try_recv().is_ok());
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn test_malformed_and_foreign_changes_are_dropped() {
        let (_, cache, manager) = manager();
        let before = cache.version();
        manager.handle_change(RowChange {
            kind: ChangeKind::Insert,
            table: "orders".into(),
            new: Some(json!({"id": "x", "status": "pending"})),
            old: None,
        });
        manager.handle_change(RowChange::delete("orders", "unknown"));
        let order = Order::new("a", 1, "Ana", 100.0, Utc::now());
        manager.handle_change(RowChange::insert("other_table", &order));
        assert_eq!(cache.version(), before);
    }

    #[test]
    fn test_completed_insert_is_ignored() {
        let (_, cache, manager) = manager();
        let order = Order::new("a", 1, "Ana", 100.0, Utc::now()).with_status(OrderStatus::Completed);
        manager.handle_change(RowChange::insert("orders", &order));
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_update_with_unpaired_item_status_is_dropped() {
        let (_, cache, manager) = manager();
        let order = Order::new("a", 1, "Ana", 100.0, Utc::now()).with_items(vec![
            OrderItem::new(1, "Clásica", "simple"),
            OrderItem::new(1, "Bacon", "doble"),
        ]);
        manager.handle_change(RowChange::insert("orders", &order));

        let mut extra = order.clone();
        if let Some(status) = extra.item_status.as_mut() {
            status.push(status[0].clone());
        }
        manager.handle_change(RowChange::update("orders", &extra));
        assert_eq!(cache.get("a").and_then(|o| o.item_status).map(|s| s.len()), Some(2));

        let mut orphan = order.clone();
        orphan.id = "b".into();
        if let Some(items) = orphan.items.as_mut() {
            items.pop();
        }
        manager.handle_change(RowChange::insert("orders", &orphan));
        assert!(!cache.contains("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_hide_defers_resync_to_confirmation() {
        let (store, cache, manager) = manager();
        manager.set_visibility(Visibility::Hidden).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        store.seed([Order::new("a", 1, "Ana", 100.0, Utc::now())]);

        assert!(manager.set_visibility(Visibility::Visible).await);
        assert_eq!(manager.status(), ChannelStatus::Connecting);
        assert!(!cache.contains("a"));

        manager.on_subscribed().await;
        assert!(cache.contains("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_hide_does_not_reconnect() {
        let (_, _, manager) = manager();
        assert!(!manager.set_visibility(Visibility::Visible).await);
        manager.set_visibility(Visibility::Hidden).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!manager.set_visibility(Visibility::Visible).await);
    }
}
