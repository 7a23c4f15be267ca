//! Item completion tracking
//!
//! `items` and `item_status` are stored as two parallel arrays coupled by
//! position. Everything that reads or writes the pair goes through this module
//! so the representation can later be folded into a single list of
//! `{item, completed}` pairs without touching callers.

use super::types::{ItemStatus, Order, OrderItem};

/// Fresh status list for newly created orders: one uncompleted entry per item.
pub fn initial_item_status(items: &[OrderItem]) -> Vec<ItemStatus> {
    items.iter().map(ItemStatus::from).collect()
}

/// `item_status.len() == items.len()` whenever both are present.
pub fn is_consistent(order: &Order) -> bool {
    match (&order.items, &order.item_status) {
        (Some(items), Some(status)) => items.len() == status.len(),
        _ => true,
    }
}

/// Status list with the flag at `index` flipped.
///
/// Returns `None` unless `index` names an entry of a consistent pair;
/// callers treat that as a no-op.
pub fn toggled(order: &Order, index: usize) -> Option<Vec<ItemStatus>> {
    let current = order.item_status.as_ref()?;
    if !is_consistent(order) || index >= current.len() {
        return None;
    }
    let mut next = current.clone();
    next[index].completed = !next[index].completed;
    Some(next)
}

/// `(completed, total)` counts for progress display.
pub fn progress(order: &Order) -> Option<(usize, usize)> {
    let status = order.item_status.as_ref()?;
    let done = status.iter().filter(|s| s.completed).count();
    Some((done, status.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;
    use chrono::Utc;

    fn order_with(items: Option<Vec<OrderItem>>, status: Option<Vec<ItemStatus>>) -> Order {
        Order {
            id: "o1".into(),
            order_number: 1,
            customer_name: "Ana".into(),
            phone: None,
            total: 1000.0,
            payment_method: None,
            created_at: Utc::now(),
            scheduled_time: None,
            delivery_address: None,
            cash_tendered: None,
            change: None,
            items,
            item_status: status,
            extras: None,
            courier_departed: false,
            status: OrderStatus::Pending,
        }
    }

    #[test]
    fn test_toggle_flips_only_target() {
        let items = vec![OrderItem::new(1, "A", "simple"), OrderItem::new(2, "B", "doble")];
        let order = order_with(Some(items.clone()), Some(initial_item_status(&items)));

        let next = toggled(&order, 1).unwrap();
        assert!(!next[0].completed);
        assert!(next[1].completed);
        // Source order untouched
        assert!(!order.item_status.as_ref().unwrap()[1].completed);
    }

    #[test]
    fn test_toggle_without_status_is_none() {
        let order = order_with(Some(vec![OrderItem::new(1, "A", "simple")]), None);
        assert!(toggled(&order, 0).is_none());
        assert_eq!(progress(&order), None);
    }

    #[test]
    fn test_toggle_out_of_range_is_none() {
        let items = vec![OrderItem::new(1, "A", "simple")];
        let order = order_with(Some(items.clone()), Some(initial_item_status(&items)));
        assert!(toggled(&order, 5).is_none());
    }

    #[test]
    fn test_consistency_and_progress() {
        let items = vec![OrderItem::new(1, "A", "simple"), OrderItem::new(1, "B", "simple")];
        let mut status = initial_item_status(&items);
        let order = order_with(Some(items.clone()), Some(status.clone()));
        assert!(is_consistent(&order));
        assert_eq!(progress(&order), Some((0, 2)));

        status[1].completed = true;
        let order = order_with(Some(items.clone()), Some(status));
        assert_eq!(progress(&order), Some((1, 2)));

        let broken = order_with(Some(items), Some(vec![]));
        assert!(!is_consistent(&broken));
    }

    #[test]
    fn test_toggle_rejects_entry_without_item() {
        let items = vec![OrderItem::new(1, "A", "simple")];
        let mut status = initial_item_status(&items);
        status.push(status[0].clone());
        let order = order_with(Some(items), Some(status));
        assert!(toggled(&order, 1).is_none());
        assert!(toggled(&order, 0).is_none());
    }
}
