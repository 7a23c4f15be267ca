//! Optimistic mutation protocol
//!
//! Every staff action is an [`OptimisticCommand`]: a forward cache mutation,
//! its inverse (captured from the pre-mutation order), and the remote patch.
//! [`Reconciler::execute`] is the single executor:
//!
//! ```text
//! apply forward ──► remote update ──┬─ ok  ──► Confirmed (+ outbound jobs)
//!                                   └─ err ──► apply inverse, Reverted
//! ```
//!
//! Commands are built from a snapshot taken before the forward mutation, so
//! the inverse never reflects changes that arrive while the write is in
//! flight.

use shared::order::tracking;
use shared::{NotifyPayload, Order, OrderPatch, OrderStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::OrderCache;
use crate::error::StoreError;
use crate::notice::{Notice, NoticeBus};
use crate::outbound::{OutboundJob, OutboundQueue};
use crate::store::OrderStore;

/// A cache mutation addressed by order id
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMutation {
    Merge(OrderPatch),
    Promote,
    Noop,
}

impl CacheMutation {
    fn apply(&self, cache: &OrderCache, order_id: &str) {
        match self {
            Self::Merge(patch) => {
                cache.merge_update(order_id, patch);
            }
            Self::Promote => {
                cache.promote_to_completed(order_id);
            }
            Self::Noop => {}
        }
    }
}

/// Forward/inverse pair plus the remote write for one staff action
#[derive(Debug, Clone)]
pub struct OptimisticCommand {
    pub label: &'static str,
    pub order_id: String,
    pub forward: CacheMutation,
    pub inverse: CacheMutation,
    /// Body of the single-row remote update
    pub remote: OrderPatch,
    /// Shown as soon as the forward mutation is applied
    pub on_applied: Option<Notice>,
    /// Side effects released once the store confirms
    pub on_confirmed: Vec<OutboundJob>,
    pub failure_title: String,
}

impl OptimisticCommand {
    /// Flip `item_status[index]`. `None` when the order has no status list or
    /// the index is out of range.
    pub fn toggle_item(order: &Order, index: usize) -> Option<Self> {
        let previous = order.item_status.as_ref()?;
        let next = tracking::toggled(order, index)?;
        let patch = OrderPatch::new().item_status(&next);
        Some(Self {
            label: "toggle_item",
            order_id: order.id.clone(),
            forward: CacheMutation::Merge(patch.clone()),
            inverse: CacheMutation::Merge(OrderPatch::new().item_status(previous)),
            remote: patch,
            on_applied: None,
            on_confirmed: Vec::new(),
            failure_title: "Error al actualizar el item".to_string(),
        })
    }

    /// Set the courier-departed / ready-for-pickup flag. `None` when already
    /// set. The customer notification is only released on confirmation.
    pub fn courier_departed(order: &Order) -> Option<Self> {
        if order.courier_departed {
            return None;
        }
        let patch = OrderPatch::new().courier_departed(true);
        let title = if order.is_pickup() {
            "Pedido listo para retirar"
        } else {
            "Cadete en camino"
        };
        Some(Self {
            label: "courier_departed",
            order_id: order.id.clone(),
            forward: CacheMutation::Merge(patch.clone()),
            inverse: CacheMutation::Merge(OrderPatch::new().courier_departed(false)),
            remote: patch,
            on_applied: Some(Notice::success(title, Some(&order.id))),
            on_confirmed: vec![OutboundJob::Notify(NotifyPayload::for_order(order))],
            failure_title: "Error al marcar salida".to_string(),
        })
    }

    /// Move a pending order to completed. `None` unless pending.
    pub fn mark_completed(order: &Order) -> Option<Self> {
        if !order.is_pending() {
            return None;
        }
        Some(Self {
            label: "mark_completed",
            order_id: order.id.clone(),
            forward: CacheMutation::Promote,
            inverse: CacheMutation::Merge(OrderPatch::new().status(OrderStatus::Pending)),
            remote: OrderPatch::new().status(OrderStatus::Completed),
            on_applied: Some(Notice::success("Pedido completado", Some(&order.id))),
            on_confirmed: Vec::new(),
            failure_title: "Error al completar el pedido".to_string(),
        })
    }
}

/// Terminal state of one command
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Remote write succeeded; local state already matched
    Confirmed,
    /// Remote write failed; inverse applied
    Reverted(StoreError),
    /// Nothing to do for this order
    Skipped,
    /// Engine torn down; result ignored
    Discarded,
}

impl Reconciliation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Generic executor for [`OptimisticCommand`]s
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    notices: NoticeBus,
    outbound: OutboundQueue,
    lifecycle: CancellationToken,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        notices: NoticeBus,
        outbound: OutboundQueue,
        lifecycle: CancellationToken,
    ) -> Self {
        Self {
            store,
            cache,
            notices,
            outbound,
            lifecycle,
        }
    }

    pub async fn execute(&self, command: OptimisticCommand) -> Reconciliation {
        if self.lifecycle.is_cancelled() {
            return Reconciliation::Discarded;
        }

        command.forward.apply(&self.cache, &command.order_id);
        if let Some(notice) = command.on_applied.clone() {
            self.notices.publish(notice);
        }

        let result = self.store.update(&command.order_id, &command.remote).await;

        if self.lifecycle.is_cancelled() {
            tracing::debug!(order_id = %command.order_id, action = command.label, "Discarding late write result");
            return Reconciliation::Discarded;
        }

        match result {
            Ok(()) => {
                tracing::debug!(order_id = %command.order_id, action = command.label, "Write confirmed");
                for job in command.on_confirmed {
                    self.outbound.enqueue(job);
                }
                Reconciliation::Confirmed
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %command.order_id,
                    action = command.label,
                    error = %e,
                    "Remote write failed, reverting"
                );
                command.inverse.apply(&self.cache, &command.order_id);
                self.notices.publish(Notice::error(
                    command.failure_title,
                    e.to_string(),
                    Some(&command.order_id),
                ));
                Reconciliation::Reverted(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::OrderItem;

    fn order() -> Order {
        Order::new("a", 3, "Ana", 2000.0, Utc::now())
            .with_items(vec![OrderItem::new(1, "A", "simple"), OrderItem::new(1, "B", "doble")])
    }

    #[test]
    fn test_toggle_inverse_is_the_snapshot() {
        let order = order();
        let command = OptimisticCommand::toggle_item(&order, 1).unwrap();
        let CacheMutation::Merge(inverse) = &command.inverse else {
            panic!("expected merge");
        };
        let reverted = inverse
            .apply_to(&command.remote.apply_to(&order).unwrap())
            .unwrap();
        assert_eq!(reverted.item_status, order.item_status);
    }

    #[test]
    fn test_builders_skip_noops() {
        let mut order = order();
        order.item_status = None;
        assert!(OptimisticCommand::toggle_item(&order, 0).is_none());

        order.courier_departed = true;
        assert!(OptimisticCommand::courier_departed(&order).is_none());

        let done = order.with_status(OrderStatus::Completed);
        assert!(OptimisticCommand::mark_completed(&done).is_none());
    }

    #[test]
    fn test_toggle_refuses_unpaired_item_status() {
        let mut order = order();
        if let Some(items) = order.items.as_mut() {
            items.truncate(1);
        }
        assert!(OptimisticCommand::toggle_item(&order, 0).is_none());
        assert!(OptimisticCommand::toggle_item(&order, 1).is_none());
    }

    #[test]
    fn test_courier_notification_waits_for_confirmation() {
        let command = OptimisticCommand::courier_departed(&order().with_address("Belgrano 100")).unwrap();
        assert_eq!(command.on_confirmed.len(), 1);
        assert!(matches!(command.on_confirmed[0], OutboundJob::Notify(_)));
        assert_eq!(command.on_applied.unwrap().title, "Cadete en camino");
    }
}
