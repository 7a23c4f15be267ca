//! Order status notification webhook

use async_trait::async_trait;
use reqwest::Client;
use shared::NotifyPayload;
use std::time::Duration;

use crate::error::NotifyError;

/// Receives dispatch notifications (courier departed / ready for pickup)
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify(&self, payload: &NotifyPayload) -> Result<(), NotifyError>;
}

/// Posts [`NotifyPayload`] as JSON. Without a URL every notification is
/// skipped.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl StatusNotifier for WebhookNotifier {
    async fn notify(&self, payload: &NotifyPayload) -> Result<(), NotifyError> {
        let Some(url) = self.url.as_deref() else {
            tracing::debug!(order_number = payload.order_number, "No notify webhook configured, skipping");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(order_number = payload.order_number, "Status notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::Order;

    #[tokio::test]
    async fn test_unconfigured_notifier_skips() {
        let notifier = WebhookNotifier::new(None);
        assert!(!notifier.is_configured());
        let order = Order::new("a", 1, "Ana", 100.0, Utc::now());
        assert!(notifier.notify(&NotifyPayload::for_order(&order)).await.is_ok());
    }
}
