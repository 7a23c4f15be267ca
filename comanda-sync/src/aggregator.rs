//! Derived order statistics
//!
//! Pure rollups over a list of orders, plus an [`Aggregator`] that memoizes
//! the full summary on the cache version. Revenue per product splits each
//! order's total evenly across its items; it is an approximation, not per-item
//! pricing.

use parking_lot::Mutex;
use shared::Order;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::OrderCache;

/// Bucket for orders without a phone number
pub const NO_PHONE: &str = "Sin teléfono";

/// Size used when an item has none
const DEFAULT_SIZE: &str = "simple";

#[derive(Debug, Clone, PartialEq)]
pub struct ProductStat {
    pub product: String,
    pub size: String,
    pub combo: bool,
    pub quantity: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerStat {
    /// Phone number, or [`NO_PHONE`]
    pub customer: String,
    pub order_count: u32,
    pub total_spent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub total_orders: usize,
    pub total_revenue: f64,
    pub unique_customers: usize,
    /// 0 when there are no orders
    pub average_order: f64,
    /// Sorted by quantity, descending
    pub products: Vec<ProductStat>,
    /// Sorted by spend, descending
    pub customers: Vec<CustomerStat>,
    /// Newest first
    pub orders: Vec<Order>,
}

/// Group items by (product, size, combo). Ties keep first-seen order.
pub fn product_rollup(orders: &[Order]) -> Vec<ProductStat> {
    let mut stats: Vec<ProductStat> = Vec::new();
    let mut index: HashMap<(String, String, bool), usize> = HashMap::new();

    for order in orders {
        let Some(items) = order.items.as_ref().filter(|i| !i.is_empty()) else {
            continue;
        };
        let share = order.total / items.len() as f64;

        for item in items {
            let product = item.product.trim();
            if product.is_empty() {
                continue;
            }
            let size = if item.size.trim().is_empty() {
                DEFAULT_SIZE.to_string()
            } else {
                item.size.clone()
            };
            let key = (product.to_string(), size, item.combo);
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                stats.push(ProductStat {
                    product: key.0.clone(),
                    size: key.1.clone(),
                    combo: key.2,
                    quantity: 0,
                    revenue: 0.0,
                });
                stats.len() - 1
            });
            stats[slot].quantity += item.quantity.max(1);
            stats[slot].revenue += share;
        }
    }

    stats.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    stats
}

/// Group orders by phone number. Ties keep first-seen order.
pub fn customer_rollup(orders: &[Order]) -> Vec<CustomerStat> {
    let mut stats: Vec<CustomerStat> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let customer = order
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(NO_PHONE)
            .to_string();
        let slot = *index.entry(customer.clone()).or_insert_with(|| {
            stats.push(CustomerStat {
                customer,
                order_count: 0,
                total_spent: 0.0,
            });
            stats.len() - 1
        });
        stats[slot].order_count += 1;
        stats[slot].total_spent += order.total;
    }

    stats.sort_by(|a, b| b.total_spent.total_cmp(&a.total_spent));
    stats
}

pub fn summarize(orders: &[Order]) -> OrderSummary {
    let total_orders = orders.len();
    let total_revenue: f64 = orders.iter().map(|o| o.total).sum();
    let customers = customer_rollup(orders);

    let mut sorted = orders.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    OrderSummary {
        total_orders,
        total_revenue,
        unique_customers: customers.len(),
        average_order: if total_orders > 0 {
            total_revenue / total_orders as f64
        } else {
            0.0
        },
        products: product_rollup(orders),
        customers,
        orders: sorted,
    }
}

/// Summary over pending + completed, recomputed only when the cache changes
pub struct Aggregator {
    cache: Arc<OrderCache>,
    memo: Mutex<Option<(u64, Arc<OrderSummary>)>>,
}

impl Aggregator {
    pub fn new(cache: Arc<OrderCache>) -> Self {
        Self {
            cache,
            memo: Mutex::new(None),
        }
    }

    pub fn summary(&self) -> Arc<OrderSummary> {
        let snapshot = self.cache.snapshot();
        if let Some((version, summary)) = self.memo.lock().as_ref()
            && *version == snapshot.version
        {
            return Arc::clone(summary);
        }

        let summary = Arc::new(summarize(&snapshot.all()));
        *self.memo.lock() = Some((snapshot.version, Arc::clone(&summary)));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shared::{OrderItem, OrderStatus};

    fn order(id: &str, phone: Option<&str>, total: f64, items: Vec<OrderItem>, minutes_ago: i64) -> Order {
        let mut order = Order::new(id, 1, "X", total, Utc::now() - Duration::minutes(minutes_ago))
            .with_items(items);
        order.phone = phone.map(str::to_string);
        order
    }

    fn fixture() -> Vec<Order> {
        vec![
            order(
                "a",
                Some("111"),
                3000.0,
                vec![OrderItem::new(2, "Clásica", ""), OrderItem::new(1, "Bacon", "doble")],
                10,
            ),
            order("b", Some("111"), 1000.0, vec![OrderItem::new(1, " Clásica ", "simple")], 5),
            order("c", None, 5000.0, vec![OrderItem::new(1, "", "simple")], 1),
        ]
    }

    #[test]
    fn test_product_rollup() {
        let stats = product_rollup(&fixture());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].product, "Clásica");
        assert_eq!(stats[0].size, "simple");
        assert_eq!(stats[0].quantity, 3);
        assert_eq!(stats[0].revenue, 1500.0 + 1000.0);
        assert_eq!(stats[1].product, "Bacon");
        assert_eq!(stats[1].revenue, 1500.0);
    }

    #[test]
    fn test_customer_rollup() {
        let stats = customer_rollup(&fixture());
        assert_eq!(stats[0].customer, NO_PHONE);
        assert_eq!(stats[0].total_spent, 5000.0);
        assert_eq!(stats[1].customer, "111");
        assert_eq!(stats[1].order_count, 2);
    }

    #[test]
    fn test_summary_and_determinism() {
        let orders = fixture();
        let first = summarize(&orders);
        let second = summarize(&orders);
        assert_eq!(first, second);
        assert_eq!(first.total_orders, 3);
        assert_eq!(first.total_revenue, 9000.0);
        assert_eq!(first.unique_customers, 2);
        assert_eq!(first.average_order, 3000.0);
        assert_eq!(first.orders[0].id, "c");

        let empty = summarize(&[]);
        assert_eq!(empty.average_order, 0.0);
    }

    #[test]
    fn test_memo_follows_cache_version() {
        let cache = Arc::new(OrderCache::new());
        let aggregator = Aggregator::new(cache.clone());
        for o in fixture() {
            cache.upsert_pending(o);
        }
        let a = aggregator.summary();
        let b = aggregator.summary();
        assert!(Arc::ptr_eq(&a, &b));

        cache.promote_to_completed("a");
        let c = aggregator.summary();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.total_orders, 3);
        assert!(c.orders.iter().any(|o| o.id == "a" && o.status == OrderStatus::Completed));
    }
}
