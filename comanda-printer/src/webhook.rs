//! HTTP print webhook delivery
//!
//! Each station has its own webhook. The body carries the base64 ticket plus
//! the order number and customer so the print service can log the job.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{PrintError, PrintResult};
use crate::ticket::{Station, Ticket, TicketKind, TicketSink};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    order_number: u32,
    ticket: String,
    nombre: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

/// Print webhook client routing tickets by station
#[derive(Debug, Clone)]
pub struct WebhookPrinter {
    client: Client,
    kitchen_url: Option<String>,
    cashier_url: Option<String>,
    timeout: Duration,
}

impl WebhookPrinter {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            kitchen_url: None,
            cashier_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reuse an existing HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_kitchen_url(mut self, url: impl Into<String>) -> Self {
        self.kitchen_url = Some(url.into());
        self
    }

    pub fn with_cashier_url(mut self, url: impl Into<String>) -> Self {
        self.cashier_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url_for(&self, station: Station) -> Option<&str> {
        match station {
            Station::Kitchen => self.kitchen_url.as_deref(),
            Station::Cashier => self.cashier_url.as_deref(),
        }
    }
}

impl Default for WebhookPrinter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketSink for WebhookPrinter {
    #[instrument(skip(self, ticket), fields(station = %ticket.station, order_number = ticket.order_number))]
    async fn deliver(&self, ticket: &Ticket) -> PrintResult<()> {
        let url = self.url_for(ticket.station).ok_or_else(|| {
            PrintError::InvalidConfig(format!("No webhook configured for {}", ticket.station))
        })?;

        let body = WebhookBody {
            order_number: ticket.order_number,
            ticket: ticket.encoded_body(),
            nombre: &ticket.customer_name,
            kind: match ticket.kind {
                TicketKind::Cancel => Some("cancel"),
                TicketKind::Order | TicketKind::Reprint => None,
            },
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Print webhook rejected ticket");
            return Err(PrintError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("Ticket delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing() {
        let printer = WebhookPrinter::new().with_kitchen_url("http://k");
        assert_eq!(printer.url_for(Station::Kitchen), Some("http://k"));
        assert_eq!(printer.url_for(Station::Cashier), None);
    }

    #[tokio::test]
    async fn test_missing_station_url_is_config_error() {
        let printer = WebhookPrinter::new().with_kitchen_url("http://k");
        let ticket = Ticket::new(Station::Cashier, TicketKind::Order, 1, "Ana", "x");
        let err = printer.deliver(&ticket).await.unwrap_err();
        assert!(matches!(err, PrintError::InvalidConfig(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cancel_body_shape() {
        let body = WebhookBody {
            order_number: 5,
            ticket: "eA==".into(),
            nombre: "Ana",
            kind: Some("cancel"),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"order_number": 5, "ticket": "eA==", "nombre": "Ana", "type": "cancel"})
        );
    }
}
