//! Local order cache
//!
//! Two collections, pending (newest first) and completed (most recently
//! completed first). Every mutation builds new collection vectors and swaps
//! them in under one short write lock, so readers only ever see whole
//! states. A version counter on a `watch` channel lets views react to
//! changes and memoize on it.
//!
//! Membership invariant: an id lives in at most one collection, and the
//! collection always matches the order's `status`.
//!
//! Shape invariant: a cached order's `item_status` has one entry per item
//! whenever both lists are present. Rows or merges that break it are logged
//! and dropped.

use parking_lot::RwLock;
use shared::order::tracking;
use shared::{Order, OrderPatch, OrderStatus};
use std::sync::Arc;
use tokio::sync::watch;

/// Which collection an order lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Pending,
    Completed,
}

/// Result of a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Merged in place
    Updated,
    /// Merge produced an identical order
    Unchanged,
    /// Status became completed: moved to the front of completed
    Promoted,
    /// Status went back to pending: moved into pending
    Demoted,
    /// Unknown completed row added to completed
    Inserted,
    /// Unknown id, nothing changed
    NotFound,
    /// Patch would produce a malformed order; nothing changed
    Invalid,
}

/// Immutable view of both collections
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub pending: Arc<Vec<Order>>,
    pub completed: Arc<Vec<Order>>,
    pub version: u64,
}

impl CacheSnapshot {
    /// Every cached order, pending first
    pub fn all(&self) -> Vec<Order> {
        self.pending
            .iter()
            .chain(self.completed.iter())
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct Collections {
    pending: Arc<Vec<Order>>,
    completed: Arc<Vec<Order>>,
}

impl Collections {
    fn locate(&self, id: &str) -> Option<(Membership, usize)> {
        if let Some(i) = self.pending.iter().position(|o| o.id == id) {
            return Some((Membership::Pending, i));
        }
        self.completed
            .iter()
            .position(|o| o.id == id)
            .map(|i| (Membership::Completed, i))
    }
}

/// Pending/completed order collections
pub struct OrderCache {
    inner: RwLock<Collections>,
    version: watch::Sender<u64>,
}

impl Default for OrderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderCache {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Collections::default()),
            version,
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    // ========== Mutations ==========

    /// Prepend an order unless its id is already cached.
    ///
    /// Returns `true` when inserted. An order whose status is already
    /// completed goes to the front of the completed collection instead.
    /// Orders with mismatched item lists are dropped.
    pub fn upsert_pending(&self, order: Order) -> bool {
        if !well_formed(&order) {
            return false;
        }
        {
            let mut inner = self.inner.write();
            if inner.locate(&order.id).is_some() {
                return false;
            }
            let target = if order.is_completed() {
                &mut inner.completed
            } else {
                &mut inner.pending
            };
            *target = Arc::new(prepended(target, order));
        }
        self.bump();
        true
    }

    /// Shallow-merge `patch` into the order with `id`, wherever it lives.
    ///
    /// A status change in the patch moves the order between collections.
    pub fn merge_update(&self, id: &str, patch: &OrderPatch) -> MergeOutcome {
        let outcome = {
            let mut inner = self.inner.write();
            let Some((membership, index)) = inner.locate(id) else {
                return MergeOutcome::NotFound;
            };
            let current = match membership {
                Membership::Pending => &inner.pending[index],
                Membership::Completed => &inner.completed[index],
            };
            let merged = match patch.apply_to(current) {
                Ok(merged) => merged,
                Err(e) => {
                    tracing::warn!(order_id = %id, error = %e, "Dropping malformed order patch");
                    return MergeOutcome::Invalid;
                }
            };
            if !well_formed(&merged) {
                return MergeOutcome::Invalid;
            }
            if &merged == current {
                return MergeOutcome::Unchanged;
            }

            match (membership, merged.status) {
                (Membership::Pending, OrderStatus::Completed) => {
                    inner.pending = Arc::new(without(&inner.pending, index));
                    inner.completed = Arc::new(prepended(&inner.completed, merged));
                    MergeOutcome::Promoted
                }
                (Membership::Completed, OrderStatus::Pending) => {
                    inner.completed = Arc::new(without(&inner.completed, index));
                    inner.pending = Arc::new(inserted_by_age(&inner.pending, merged));
                    MergeOutcome::Demoted
                }
                (Membership::Pending, _) => {
                    inner.pending = Arc::new(replaced(&inner.pending, index, merged));
                    MergeOutcome::Updated
                }
                (Membership::Completed, _) => {
                    inner.completed = Arc::new(replaced(&inner.completed, index, merged));
                    MergeOutcome::Updated
                }
            }
        };
        self.bump();
        outcome
    }

    /// Merge a full server row.
    ///
    /// Unknown completed rows are added to completed; unknown pending rows are
    /// ignored (they arrive through inserts).
    pub fn apply_row(&self, row: Order) -> MergeOutcome {
        let patch = match OrderPatch::from_row(&row) {
            Ok(patch) => patch,
            Err(e) => {
                tracing::warn!(order_id = %row.id, error = %e, "Dropping unencodable row");
                return MergeOutcome::Invalid;
            }
        };
        match self.merge_update(&row.id, &patch) {
            MergeOutcome::NotFound if row.is_completed() => {
                if self.upsert_pending(row) {
                    MergeOutcome::Inserted
                } else {
                    MergeOutcome::Unchanged
                }
            }
            outcome => outcome,
        }
    }

    /// Move a pending order to the front of completed with its status
    /// flipped. No-op (returns `false`) when the order is not pending.
    pub fn promote_to_completed(&self, id: &str) -> bool {
        {
            let mut inner = self.inner.write();
            let Some(index) = inner.pending.iter().position(|o| o.id == id) else {
                return false;
            };
            let mut order = inner.pending[index].clone();
            order.status = OrderStatus::Completed;
            inner.pending = Arc::new(without(&inner.pending, index));
            inner.completed = Arc::new(prepended(&inner.completed, order));
        }
        self.bump();
        true
    }

    /// Drop an id from both collections. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> bool {
        {
            let mut inner = self.inner.write();
            let in_pending = inner.pending.iter().any(|o| o.id == id);
            let in_completed = inner.completed.iter().any(|o| o.id == id);
            if !in_pending && !in_completed {
                return false;
            }
            if in_pending {
                inner.pending = Arc::new(inner.pending.iter().filter(|o| o.id != id).cloned().collect());
            }
            if in_completed {
                inner.completed =
                    Arc::new(inner.completed.iter().filter(|o| o.id != id).cloned().collect());
            }
        }
        self.bump();
        true
    }

    /// Replace collections wholesale after a full fetch. `None` keeps the
    /// current collection. Rows are filed by their status; an id seen twice
    /// keeps its first occurrence, completed rows winning. Malformed rows are
    /// skipped.
    pub fn replace(&self, pending: Option<Vec<Order>>, completed: Option<Vec<Order>>) {
        {
            let mut inner = self.inner.write();
            let completed = completed.unwrap_or_else(|| inner.completed.as_ref().clone());
            let pending = pending.unwrap_or_else(|| inner.pending.as_ref().clone());

            let mut seen = std::collections::HashSet::new();
            let mut next_completed = Vec::with_capacity(completed.len());
            let mut next_pending = Vec::with_capacity(pending.len());
            for order in completed.into_iter().chain(pending) {
                if !well_formed(&order) || !seen.insert(order.id.clone()) {
                    continue;
                }
                if order.is_completed() {
                    next_completed.push(order);
                } else {
                    next_pending.push(order);
                }
            }
            inner.pending = Arc::new(next_pending);
            inner.completed = Arc::new(next_completed);
        }
        self.bump();
    }

    // ========== Reads ==========

    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.inner.read();
        CacheSnapshot {
            pending: Arc::clone(&inner.pending),
            completed: Arc::clone(&inner.completed),
            version: *self.version.borrow(),
        }
    }

    pub fn pending(&self) -> Arc<Vec<Order>> {
        Arc::clone(&self.inner.read().pending)
    }

    pub fn completed(&self) -> Arc<Vec<Order>> {
        Arc::clone(&self.inner.read().completed)
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        let inner = self.inner.read();
        inner
            .pending
            .iter()
            .chain(inner.completed.iter())
            .find(|o| o.id == id)
            .cloned()
    }

    pub fn membership(&self, id: &str) -> Option<Membership> {
        self.inner.read().locate(id).map(|(m, _)| m)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.membership(id).is_some()
    }

    /// Pending orders oldest first, for the kitchen queue. A copy; the
    /// stored order is untouched.
    pub fn pending_fifo(&self) -> Vec<Order> {
        let mut orders = self.pending().as_ref().clone();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orders
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver that observes every committed mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

fn well_formed(order: &Order) -> bool {
    let ok = tracking::is_consistent(order);
    if !ok {
        tracing::warn!(
            order_id = %order.id,
            items = order.items.as_ref().map_or(0, Vec::len),
            item_status = order.item_status.as_ref().map_or(0, Vec::len),
            "Dropping order with mismatched item status"
        );
    }
    ok
}

fn prepended(list: &[Order], order: Order) -> Vec<Order> {
    let mut next = Vec::with_capacity(list.len() + 1);
    next.push(order);
    next.extend_from_slice(list);
    next
}

fn without(list: &[Order], index: usize) -> Vec<Order> {
    list.iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, o)| o.clone())
        .collect()
}

fn replaced(list: &[Order], index: usize, order: Order) -> Vec<Order> {
    let mut next = list.to_vec();
    next[index] = order;
    next
}

/// Insert keeping newest-first by `created_at`
fn inserted_by_age(list: &[Order], order: Order) -> Vec<Order> {
    let at = list
        .iter()
        .position(|o| o.created_at < order.created_at)
        .unwrap_or(list.len());
    let mut next = list.to_vec();
    next.insert(at, order);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shared::OrderItem;

    fn order(id: &str, minutes_ago: i64) -> Order {
        Order::new(id, 1, "Ana", 1000.0, Utc::now() - Duration::minutes(minutes_ago))
            .with_items(vec![OrderItem::new(1, "A", "simple"), OrderItem::new(1, "B", "simple")])
    }

    fn assert_exclusive(cache: &OrderCache) {
        let snap = cache.snapshot();
        for o in snap.pending.iter() {
            assert!(o.is_pending());
            assert!(!snap.completed.iter().any(|c| c.id == o.id));
        }
        for o in snap.completed.iter() {
            assert!(o.is_completed());
        }
    }

    #[test]
    fn test_upsert_is_idempotent_and_prepends() {
        let cache = OrderCache::new();
        assert!(cache.upsert_pending(order("a", 5)));
        assert!(cache.upsert_pending(order("b", 1)));
        assert!(!cache.upsert_pending(order("a", 5)));

        let ids: Vec<_> = cache.pending().iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_merge_preserves_and_moves() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("a", 1));

        let outcome = cache.merge_update("a", &OrderPatch::new().courier_departed(true));
        assert_eq!(outcome, MergeOutcome::Updated);
        let merged = cache.get("a").unwrap();
        assert!(merged.courier_departed);
        assert_eq!(merged.item_status.as_ref().map(Vec::len), Some(2));

        let outcome = cache.merge_update("a", &OrderPatch::new().status(OrderStatus::Completed));
        assert_eq!(outcome, MergeOutcome::Promoted);
        assert_eq!(cache.membership("a"), Some(Membership::Completed));
        assert_exclusive(&cache);

        let outcome = cache.merge_update("a", &OrderPatch::new().status(OrderStatus::Pending));
        assert_eq!(outcome, MergeOutcome::Demoted);
        assert_eq!(cache.membership("a"), Some(Membership::Pending));
        assert_exclusive(&cache);
    }

    #[test]
    fn test_unchanged_merge_keeps_version() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("a", 1));
        let before = cache.version();
        assert_eq!(
            cache.merge_update("a", &OrderPatch::new().courier_departed(false)),
            MergeOutcome::Unchanged
        );
        assert_eq!(cache.version(), before);
    }

    #[test]
    fn test_demotion_keeps_age_order() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("old", 30));
        cache.upsert_pending(order("new", 1));
        cache.upsert_pending(order("mid", 10).with_status(OrderStatus::Completed));

        cache.merge_update("mid", &OrderPatch::new().status(OrderStatus::Pending));
        let ids: Vec<_> = cache.pending().iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_promote_is_noop_when_not_pending() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("a", 1));
        assert!(cache.promote_to_completed("a"));
        assert!(!cache.promote_to_completed("a"));
        assert!(!cache.promote_to_completed("missing"));
        assert_eq!(cache.completed().len(), 1);
        assert!(cache.completed()[0].is_completed());
        assert_exclusive(&cache);
    }

    #[test]
    fn test_apply_row_for_unknown_ids() {
        let cache = OrderCache::new();
        assert_eq!(cache.apply_row(order("p", 1)), MergeOutcome::NotFound);
        assert!(!cache.contains("p"));

        let done = order("c", 1).with_status(OrderStatus::Completed);
        assert_eq!(cache.apply_row(done.clone()), MergeOutcome::Inserted);
        assert_eq!(cache.apply_row(done), MergeOutcome::Unchanged);
        assert_eq!(cache.completed().len(), 1);
    }

    #[test]
    fn test_remove_and_replace() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("a", 1));
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));

        let dup = order("x", 1);
        cache.replace(
            Some(vec![dup.clone(), order("y", 2)]),
            Some(vec![dup.with_status(OrderStatus::Completed)]),
        );
        assert_eq!(cache.pending().len(), 1);
        assert_eq!(cache.membership("x"), Some(Membership::Completed));
        assert_exclusive(&cache);
    }

    fn mismatched(id: &str) -> Order {
        let mut order = order(id, 1);
        if let Some(status) = order.item_status.as_mut() {
            status.pop();
        }
        order
    }

    #[test]
    fn test_mismatched_rows_are_dropped() {
        let cache = OrderCache::new();
        assert!(!cache.upsert_pending(mismatched("bad")));
        assert!(!cache.contains("bad"));

        cache.replace(Some(vec![mismatched("bad"), order("ok", 1)]), Some(Vec::new()));
        assert!(!cache.contains("bad"));
        assert!(cache.contains("ok"));
    }

    #[test]
    fn test_merge_breaking_item_pairing_is_invalid() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("a", 1));
        let before = cache.version();

        let mut status = cache.get("a").unwrap().item_status.unwrap();
        status.push(status[0].clone());
        let outcome = cache.merge_update("a", &OrderPatch::new().item_status(&status));

        assert_eq!(outcome, MergeOutcome::Invalid);
        assert_eq!(cache.get("a").unwrap().item_status.map(|s| s.len()), Some(2));
        assert_eq!(cache.version(), before);
    }

    #[test]
    fn test_fifo_is_a_read_side_copy() {
        let cache = OrderCache::new();
        cache.upsert_pending(order("old", 20));
        cache.upsert_pending(order("new", 1));

        let fifo: Vec<_> = cache.pending_fifo().into_iter().map(|o| o.id).collect();
        assert_eq!(fifo, vec!["old", "new"]);
        assert_eq!(cache.pending()[0].id, "new");
    }
}
