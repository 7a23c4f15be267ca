//! Order data model
//!
//! - Row types mirroring the `orders` table
//! - Shallow patches applied to cached rows and sent as remote updates
//! - Item completion tracking (items / item_status positional pair)
//! - Payment-method codec and fulfilment helpers

pub mod fulfillment;
pub mod patch;
pub mod payment;
pub mod tracking;
pub mod types;

// Re-exports
pub use fulfillment::{DispatchState, FulfillmentKind, OrderAge};
pub use patch::OrderPatch;
pub use payment::{PaymentMethod, PaymentPart, format_amount};
pub use types::*;
