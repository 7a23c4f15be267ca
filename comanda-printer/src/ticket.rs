//! Ticket envelope and the delivery seam

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PrintResult;

/// Printer station a ticket is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Station {
    Kitchen,
    Cashier,
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kitchen => write!(f, "kitchen"),
            Self::Cashier => write!(f, "cashier"),
        }
    }
}

/// Why the ticket is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Order,
    Reprint,
    Cancel,
}

/// A rendered ticket ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub station: Station,
    pub kind: TicketKind,
    pub order_number: u32,
    pub customer_name: String,
    /// Rendered plain text
    pub body: String,
}

impl Ticket {
    pub fn new(
        station: Station,
        kind: TicketKind,
        order_number: u32,
        customer_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            station,
            kind,
            order_number,
            customer_name: customer_name.into(),
            body: body.into(),
        }
    }

    /// Base64 of the UTF-8 body, as expected by the print webhooks
    pub fn encoded_body(&self) -> String {
        STANDARD.encode(self.body.as_bytes())
    }
}

/// Destination that accepts rendered tickets
#[async_trait]
pub trait TicketSink: Send + Sync {
    async fn deliver(&self, ticket: &Ticket) -> PrintResult<()>;
}
