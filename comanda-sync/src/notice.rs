//! User-visible notices (toasts)

use shared::Order;
use shared::order::format_amount;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub order_id: Option<String>,
}

impl Notice {
    pub fn new_order(order: &Order) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "¡Nuevo Pedido!".to_string(),
            message: format!("{} - ${}", order.customer_name, format_amount(order.total)),
            order_id: Some(order.id.clone()),
        }
    }

    pub fn success(title: impl Into<String>, order_id: Option<&str>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            message: String::new(),
            order_id: order_id.map(str::to_string),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>, order_id: Option<&str>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
            order_id: order_id.map(str::to_string),
        }
    }
}

/// Fan-out of notices to any number of listeners
#[derive(Debug, Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current listeners; dropped when nobody listens
    pub fn publish(&self, notice: Notice) {
        tracing::debug!(title = %notice.title, level = ?notice.level, "Notice");
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_order_notice_text() {
        let order = Order::new("a", 4, "Lucía", 15500.0, Utc::now());
        let notice = Notice::new_order(&order);
        assert_eq!(notice.title, "¡Nuevo Pedido!");
        assert_eq!(notice.message, "Lucía - $15.500");
    }

    #[tokio::test]
    async fn test_bus_fans_out() {
        let bus = NoticeBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(Notice::success("Listo", Some("x")));
        assert_eq!(a.recv().await.unwrap().title, "Listo");
        assert_eq!(b.recv().await.unwrap().order_id.as_deref(), Some("x"));
    }
}
