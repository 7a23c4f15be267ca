//! Shared types for the comanda order system
//!
//! Order data model, change-feed wire types and the status-notification
//! payload shared between the sync engine and the printer crate.

pub mod error;
pub mod message;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::ErrorCategory;
pub use message::{ChannelStatus, ChangeKind, FeedMessage, NotifyPayload, RowChange};
pub use order::{
    ExtraItem, FulfillmentKind, ItemStatus, Order, OrderItem, OrderPatch, OrderStatus,
    PaymentMethod, PaymentPart,
};
