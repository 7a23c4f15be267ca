//! Ticket content
//!
//! What each station prints for an order. Delivery goes through the
//! outbound queue.

mod renderer;

pub use renderer::TicketRenderer;
