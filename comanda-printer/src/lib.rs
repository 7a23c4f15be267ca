//! # comanda-printer
//!
//! Ticket printing library - delivery and layout primitives only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - Plain-text ticket layout (fixed paper width)
//! - Ticket envelope (station, order number, base64 body)
//! - Delivery to print webhooks over HTTP
//!
//! What goes on a kitchen or cashier ticket is decided by the sync engine
//! (`comanda-sync::printing`). The thermal byte protocol is the print
//! service's concern.
//!
//! ## Example
//!
//! ```ignore
//! use comanda_printer::{Station, Ticket, TicketKind, TicketSink, TicketTextBuilder, WebhookPrinter};
//!
//! let mut b = TicketTextBuilder::new(32);
//! b.center("COCINA").eq_sep().write_line("PEDIDO #12");
//!
//! let ticket = Ticket::new(Station::Kitchen, TicketKind::Order, 12, "Lucía", b.finalize());
//! let printer = WebhookPrinter::new().with_kitchen_url("https://print.example/cocina");
//! printer.deliver(&ticket).await?;
//! ```

mod error;
mod text;
mod ticket;
mod webhook;

// Re-exports
pub use error::{PrintError, PrintResult};
pub use text::{TicketTextBuilder, text_width};
pub use ticket::{Station, Ticket, TicketKind, TicketSink};
pub use webhook::WebhookPrinter;
