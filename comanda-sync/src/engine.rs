//! Order synchronization engine
//!
//! One explicitly constructed instance owns the cache, the change-feed
//! supervisor, the reconciler and the outbound worker. `init()` loads the
//! cache and starts the background tasks; `dispose()` cancels them and makes
//! late write results inert.

use chrono::Utc;
use comanda_printer::{Station, TicketKind, TicketSink, WebhookPrinter};
use parking_lot::Mutex;
use shared::{ChannelStatus, Order, RowChange};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::aggregator::{Aggregator, OrderSummary};
use crate::cache::{CacheSnapshot, OrderCache};
use crate::cancel::{self, Cancellation};
use crate::config::{RemoteConfig, SyncConfig};
use crate::daily;
use crate::error::{SyncError, SyncResult};
use crate::intake::NewOrderRequest;
use crate::notice::{Notice, NoticeBus};
use crate::outbound::{
    OutboundJob, OutboundQueue, OutboundStatsSnapshot, OutboundWorker, StatusNotifier,
    WebhookNotifier,
};
use crate::printing::TicketRenderer;
use crate::reconciler::{OptimisticCommand, Reconciler, Reconciliation};
use crate::status::StatusReport;
use crate::store::{ChangeFeed, OrderStore, RestOrderStore};
use crate::subscription::{SubscriptionManager, Visibility};
use crate::tasks::{BackgroundTasks, TaskKind};

enum Lifecycle {
    Idle {
        worker: OutboundWorker,
        rx: mpsc::UnboundedReceiver<OutboundJob>,
    },
    Running(BackgroundTasks),
    Disposed,
}

/// Builder for [`OrderSyncEngine`]
pub struct EngineBuilder {
    store: Arc<dyn OrderStore>,
    feed: Arc<dyn ChangeFeed>,
    printer: Option<Arc<dyn TicketSink>>,
    notifier: Option<Arc<dyn StatusNotifier>>,
    config: SyncConfig,
}

impl EngineBuilder {
    pub fn new(store: Arc<dyn OrderStore>, feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            store,
            feed,
            printer: None,
            notifier: None,
            config: SyncConfig::default(),
        }
    }

    pub fn printer(mut self, printer: Arc<dyn TicketSink>) -> Self {
        self.printer = Some(printer);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> OrderSyncEngine {
        let config = self.config;
        let printer = self
            .printer
            .unwrap_or_else(|| Arc::new(WebhookPrinter::new()));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(WebhookNotifier::new(None)));

        let cache = Arc::new(OrderCache::new());
        let notices = NoticeBus::new(config.notice_capacity);
        let lifecycle = CancellationToken::new();
        let (outbound, rx) = OutboundQueue::channel();
        let worker = OutboundWorker::new(printer, notifier, config.outbound.clone(), &outbound);

        let subscription = Arc::new(
            SubscriptionManager::new(
                self.feed,
                Arc::clone(&self.store),
                Arc::clone(&cache),
                notices.clone(),
                config.table.clone(),
            )
            .with_reconnect_delay(config.reconnect_delay)
            .with_visibility_threshold(config.visibility_threshold),
        );
        let reconciler = Reconciler::new(
            Arc::clone(&self.store),
            Arc::clone(&cache),
            notices.clone(),
            outbound.clone(),
            lifecycle.clone(),
        );

        OrderSyncEngine {
            renderer: TicketRenderer::new(config.ticket_width, config.timezone),
            aggregator: Aggregator::new(Arc::clone(&cache)),
            store: self.store,
            cache,
            notices,
            subscription,
            reconciler,
            outbound,
            lifecycle,
            state: Mutex::new(Lifecycle::Idle { worker, rx }),
            config,
        }
    }
}

pub struct OrderSyncEngine {
    config: SyncConfig,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    notices: NoticeBus,
    subscription: Arc<SubscriptionManager>,
    reconciler: Reconciler,
    aggregator: Aggregator,
    renderer: TicketRenderer,
    outbound: OutboundQueue,
    lifecycle: CancellationToken,
    state: Mutex<Lifecycle>,
}

impl OrderSyncEngine {
    pub fn builder(store: Arc<dyn OrderStore>, feed: Arc<dyn ChangeFeed>) -> EngineBuilder {
        EngineBuilder::new(store, feed)
    }

    /// Engine over the hosted REST store and the configured webhooks
    pub fn from_remote(
        remote: &RemoteConfig,
        feed: Arc<dyn ChangeFeed>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let store = Arc::new(RestOrderStore::new(remote, config.table.clone())?);

        let mut printer = WebhookPrinter::new().with_timeout(remote.http_timeout);
        if let Some(url) = &remote.kitchen_webhook_url {
            printer = printer.with_kitchen_url(url);
        }
        if let Some(url) = &remote.cashier_webhook_url {
            printer = printer.with_cashier_url(url);
        }
        let notifier =
            WebhookNotifier::new(remote.notify_webhook_url.clone()).with_timeout(remote.http_timeout);

        Ok(Self::builder(store, feed)
            .printer(Arc::new(printer))
            .notifier(Arc::new(notifier))
            .config(config)
            .build())
    }

    // ========== Lifecycle ==========

    /// Load the cache and start the feed supervisor and outbound worker.
    ///
    /// A failed initial fetch is not fatal: the first confirmed subscription
    /// catches up. Calling `init` again while running is a no-op.
    pub async fn init(&self) -> SyncResult<()> {
        self.ensure_live()?;

        if let Err(e) = self.subscription.resync().await {
            tracing::warn!(error = %e, "Initial fetch failed, catching up once connected");
            self.subscription.request_catch_up();
        }

        let mut state = self.state.lock();
        let (worker, rx) = match std::mem::replace(&mut *state, Lifecycle::Disposed) {
            Lifecycle::Idle { worker, rx } => (worker, rx),
            Lifecycle::Running(tasks) => {
                *state = Lifecycle::Running(tasks);
                return Ok(());
            }
            Lifecycle::Disposed => return Err(SyncError::Disposed),
        };

        let mut tasks = BackgroundTasks::with_parent(&self.lifecycle);
        let token = tasks.shutdown_token();
        tasks.spawn(
            "change_feed",
            TaskKind::Supervisor,
            Arc::clone(&self.subscription).run(token.clone()),
        );
        tasks.spawn("outbound", TaskKind::Worker, worker.run(rx, token));
        *state = Lifecycle::Running(tasks);

        tracing::info!(table = %self.config.table, "Order sync engine started");
        Ok(())
    }

    /// Cancel the subscription, any scheduled retry and the outbound worker.
    /// Write results that arrive afterwards are ignored.
    pub async fn dispose(&self) {
        self.lifecycle.cancel();
        let previous = std::mem::replace(&mut *self.state.lock(), Lifecycle::Disposed);
        if let Lifecycle::Running(tasks) = previous {
            tasks.shutdown().await;
        }
        tracing::info!("Order sync engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    fn ensure_live(&self) -> SyncResult<()> {
        if self.lifecycle.is_cancelled() {
            return Err(SyncError::Disposed);
        }
        Ok(())
    }

    // ========== Reads ==========

    pub fn pending(&self) -> Arc<Vec<Order>> {
        self.cache.pending()
    }

    pub fn completed(&self) -> Arc<Vec<Order>> {
        self.cache.completed()
    }

    /// Pending orders oldest first (kitchen view)
    pub fn pending_fifo(&self) -> Vec<Order> {
        self.cache.pending_fifo()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.cache.get(order_id)
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    pub fn summary(&self) -> Arc<OrderSummary> {
        self.aggregator.summary()
    }

    pub fn connection_status(&self) -> ChannelStatus {
        self.subscription.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.subscription.watch_status()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn outbound_stats(&self) -> OutboundStatsSnapshot {
        self.outbound.stats()
    }

    // ========== Staff actions ==========

    pub async fn toggle_item(&self, order_id: &str, index: usize) -> Reconciliation {
        let command = self
            .cache
            .get(order_id)
            .and_then(|order| OptimisticCommand::toggle_item(&order, index));
        self.run_command(order_id, command).await
    }

    pub async fn mark_courier_departed(&self, order_id: &str) -> Reconciliation {
        let command = self
            .cache
            .get(order_id)
            .and_then(|order| OptimisticCommand::courier_departed(&order));
        self.run_command(order_id, command).await
    }

    pub async fn mark_completed(&self, order_id: &str) -> Reconciliation {
        let command = self
            .cache
            .get(order_id)
            .and_then(|order| OptimisticCommand::mark_completed(&order));
        self.run_command(order_id, command).await
    }

    async fn run_command(&self, order_id: &str, command: Option<OptimisticCommand>) -> Reconciliation {
        match command {
            Some(command) => self.reconciler.execute(command).await,
            None => {
                tracing::debug!(order_id = %order_id, "Nothing to do for order");
                Reconciliation::Skipped
            }
        }
    }

    // ========== Intake and lookups ==========

    /// Validate, number, persist and print a new order
    pub async fn submit_order(&self, request: NewOrderRequest) -> SyncResult<Order> {
        self.ensure_live()?;
        request.validate()?;

        let number = self.store.next_order_number().await?;
        let order = request.build_order(number, Utc::now());
        let stored = self.store.insert(&order).await?;
        tracing::info!(order_id = %stored.id, order_number = stored.order_number, "Order created");

        self.cache.upsert_pending(stored.clone());
        for ticket in self.renderer.order_tickets(&stored) {
            self.outbound.enqueue(OutboundJob::Print(ticket));
        }
        Ok(stored)
    }

    /// Cancel today's order `order_number` if it is recent enough
    pub async fn cancel_order(&self, order_number: u32) -> SyncResult<Cancellation> {
        self.ensure_live()?;
        let now = Utc::now();
        let order = daily::find_todays_order(self.store.as_ref(), order_number, self.config.timezone, now)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("pedido #{order_number}")))?;

        cancel::check_window(&order, now, self.config.cancel_window)?;

        self.store.delete(&order.id).await?;
        self.cache.remove(&order.id);
        tracing::info!(order_id = %order.id, order_number, "Order cancelled");

        for station in [Station::Kitchen, Station::Cashier] {
            let ticket = self
                .renderer
                .cancellation(station, order.order_number, &order.customer_name);
            self.outbound.enqueue(OutboundJob::Print(ticket));
        }
        Ok(Cancellation::from(&order))
    }

    /// Queue a cashier reprint for a cached order
    pub fn reprint(&self, order_id: &str) -> SyncResult<()> {
        self.ensure_live()?;
        let order = self
            .cache
            .get(order_id)
            .ok_or_else(|| SyncError::NotFound(order_id.to_string()))?;
        let ticket = self.renderer.cashier(&order, TicketKind::Reprint);
        self.outbound.enqueue(OutboundJob::Print(ticket));
        Ok(())
    }

    pub async fn status_report(&self, order_number: u32) -> SyncResult<StatusReport> {
        let order = daily::find_todays_order(
            self.store.as_ref(),
            order_number,
            self.config.timezone,
            Utc::now(),
        )
        .await?;
        Ok(order
            .as_ref()
            .map(StatusReport::for_order)
            .unwrap_or_else(|| StatusReport::not_found(order_number)))
    }

    // ========== Connection ==========

    /// Route one change-feed event into the cache
    pub fn apply_change(&self, change: RowChange) {
        self.subscription.handle_change(change);
    }

    /// Returns `true` when becoming visible forced a reconnect and resync
    pub async fn set_visibility(&self, visibility: Visibility) -> bool {
        if self.lifecycle.is_cancelled() {
            return false;
        }
        self.subscription.set_visibility(visibility).await
    }

    /// Drop the current subscription and subscribe again
    pub fn reconnect(&self) {
        if !self.lifecycle.is_cancelled() {
            self.subscription.connect();
        }
    }

    /// Replace the cache with the store's current rows
    pub async fn resync(&self) -> SyncResult<()> {
        self.ensure_live()?;
        self.subscription.resync().await?;
        Ok(())
    }
}
