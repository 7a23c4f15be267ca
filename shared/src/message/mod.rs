//! Change-feed wire types
//!
//! Shapes follow the hosted database's realtime channel: a status stream for
//! the subscription itself and row-level change events carrying the full new
//! row (insert/update) or the old identity (delete).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::order::Order;

pub mod notify;
pub use notify::NotifyPayload;

/// Subscription health as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Row change event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A row-level change
///
/// Rows are kept as raw JSON until a handler decodes them, so a malformed row
/// only fails its own handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl RowChange {
    pub fn insert(table: impl Into<String>, order: &Order) -> Self {
        Self {
            kind: ChangeKind::Insert,
            table: table.into(),
            new: serde_json::to_value(order).ok(),
            old: None,
        }
    }

    pub fn update(table: impl Into<String>, order: &Order) -> Self {
        Self {
            kind: ChangeKind::Update,
            table: table.into(),
            new: serde_json::to_value(order).ok(),
            old: None,
        }
    }

    pub fn delete(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            table: table.into(),
            new: None,
            old: Some(serde_json::json!({ "id": id.into() })),
        }
    }

    /// Decode the new row.
    pub fn new_order(&self) -> Result<Order, serde_json::Error> {
        match &self.new {
            Some(row) => serde_json::from_value(row.clone()),
            None => Err(serde::de::Error::custom("change has no new row")),
        }
    }

    /// Identity of the affected row: `old.id` for deletes, `new.id` otherwise.
    pub fn row_id(&self) -> Option<&str> {
        let row = match self.kind {
            ChangeKind::Delete => self.old.as_ref(),
            _ => self.new.as_ref(),
        };
        row.and_then(|r| r.get("id")).and_then(Value::as_str)
    }
}

/// Message delivered on a feed subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Transport confirmed the subscription
    Subscribed,
    Change(RowChange),
    ChannelError(String),
    TimedOut,
    Closed,
}

impl FeedMessage {
    /// Terminal for the current subscription
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ChannelError(_) | Self::TimedOut | Self::Closed
        )
    }

    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::ChannelError(e) => Some(format!("channel error: {e}")),
            Self::TimedOut => Some("timed out".to_string()),
            Self::Closed => Some("closed".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_realtime_payload() {
        let change: RowChange = serde_json::from_value(json!({
            "eventType": "DELETE",
            "table": "orders",
            "new": {},
            "old": {"id": "abc"}
        }))
        .unwrap();
        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.row_id(), Some("abc"));
    }

    #[test]
    fn test_malformed_new_row() {
        let change = RowChange {
            kind: ChangeKind::Insert,
            table: "orders".into(),
            new: Some(json!({"id": 1})),
            old: None,
        };
        assert!(change.new_order().is_err());
        assert!(change.row_id().is_none());

        let empty = RowChange {
            kind: ChangeKind::Update,
            table: "orders".into(),
            new: None,
            old: None,
        };
        assert!(empty.new_order().is_err());
    }

    #[test]
    fn test_feed_failures() {
        assert!(!FeedMessage::Subscribed.is_failure());
        assert!(FeedMessage::TimedOut.is_failure());
        assert_eq!(
            FeedMessage::ChannelError("boom".into()).failure_reason().as_deref(),
            Some("channel error: boom")
        );
        assert_eq!(ChannelStatus::default(), ChannelStatus::Disconnected);
    }
}
