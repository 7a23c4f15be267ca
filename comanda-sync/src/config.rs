//! Engine and remote endpoint configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | ORDERS_TABLE | orders | Table mirrored by the cache |
//! | RECONNECT_DELAY_MS | 3000 | Fixed delay before re-subscribing |
//! | VISIBILITY_THRESHOLD_MS | 10000 | Hidden time that forces reconnect + resync |
//! | CANCEL_WINDOW_MINUTES | 15 | Age limit for cancellations |
//! | OUTBOUND_MAX_ATTEMPTS | 3 | Delivery attempts per print/notify job |
//! | STORE_TIMEZONE | America/Argentina/Buenos_Aires | Day boundary for order numbers |
//! | TICKET_WIDTH | 32 | Ticket paper width in characters |
//! | STORE_URL / STORE_API_KEY | - | Hosted database endpoint |
//! | KITCHEN_WEBHOOK_URL / CASHIER_WEBHOOK_URL | - | Print webhooks |
//! | NOTIFY_WEBHOOK_URL | - | Order status notification webhook |
//! | HTTP_TIMEOUT_SECS | 10 | Outbound HTTP timeout |

use chrono_tz::Tz;
use std::time::Duration;

const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Argentina::Buenos_Aires;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Retry policy for the outbound print / notification queue
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundConfig {
    /// Total delivery attempts per job (first try included)
    pub max_attempts: u32,
    /// Delay before the first retry, doubled each time
    pub base_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl OutboundConfig {
    /// Backoff before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Table mirrored by the cache and watched on the change feed
    pub table: String,
    /// Fixed delay between a feed failure and the next subscribe attempt
    pub reconnect_delay: Duration,
    /// Hidden longer than this → reconnect + full resync on visible
    pub visibility_threshold: Duration,
    /// Orders older than this cannot be cancelled
    pub cancel_window: Duration,
    pub outbound: OutboundConfig,
    /// Buffered user-visible notices per subscriber
    pub notice_capacity: usize,
    /// Day boundary for the daily order number
    pub timezone: Tz,
    /// Ticket paper width in characters (58mm: 32, 80mm: 48)
    pub ticket_width: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table: "orders".to_string(),
            reconnect_delay: Duration::from_secs(3),
            visibility_threshold: Duration::from_secs(10),
            cancel_window: Duration::from_secs(15 * 60),
            outbound: OutboundConfig::default(),
            notice_capacity: 256,
            timezone: DEFAULT_TIMEZONE,
            ticket_width: 32,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let outbound = OutboundConfig {
            max_attempts: env_parse("OUTBOUND_MAX_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.outbound.max_attempts),
            ..defaults.outbound.clone()
        };

        Self {
            table: env_string("ORDERS_TABLE").unwrap_or(defaults.table),
            reconnect_delay: env_parse("RECONNECT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_delay),
            visibility_threshold: env_parse("VISIBILITY_THRESHOLD_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.visibility_threshold),
            cancel_window: env_parse("CANCEL_WINDOW_MINUTES")
                .map(|m: u64| Duration::from_secs(m * 60))
                .unwrap_or(defaults.cancel_window),
            outbound,
            notice_capacity: defaults.notice_capacity,
            timezone: env_string("STORE_TIMEZONE")
                .and_then(|tz| match tz.parse::<Tz>() {
                    Ok(tz) => Some(tz),
                    Err(e) => {
                        tracing::warn!(timezone = %tz, error = %e, "Unknown STORE_TIMEZONE, using default");
                        None
                    }
                })
                .unwrap_or(defaults.timezone),
            ticket_width: env_parse("TICKET_WIDTH").unwrap_or(defaults.ticket_width),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_visibility_threshold(mut self, threshold: Duration) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    pub fn with_cancel_window(mut self, window: Duration) -> Self {
        self.cancel_window = window;
        self
    }

    pub fn with_outbound(mut self, outbound: OutboundConfig) -> Self {
        self.outbound = outbound;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_ticket_width(mut self, width: usize) -> Self {
        self.ticket_width = width;
        self
    }
}

/// Hosted database and webhook endpoints
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    /// Project base URL (the REST API lives under `/rest/v1`)
    pub store_url: String,
    pub api_key: String,
    pub kitchen_webhook_url: Option<String>,
    pub cashier_webhook_url: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub http_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(store_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            api_key: api_key.into(),
            http_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        Self {
            store_url: env_string("STORE_URL").unwrap_or_default(),
            api_key: env_string("STORE_API_KEY").unwrap_or_default(),
            kitchen_webhook_url: env_string("KITCHEN_WEBHOOK_URL"),
            cashier_webhook_url: env_string("CASHIER_WEBHOOK_URL"),
            notify_webhook_url: env_string("NOTIFY_WEBHOOK_URL"),
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS").unwrap_or(10)),
        }
    }

    pub fn with_kitchen_webhook(mut self, url: impl Into<String>) -> Self {
        self.kitchen_webhook_url = Some(url.into());
        self
    }

    pub fn with_cashier_webhook(mut self, url: impl Into<String>) -> Self {
        self.cashier_webhook_url = Some(url.into());
        self
    }

    pub fn with_notify_webhook(mut self, url: impl Into<String>) -> Self {
        self.notify_webhook_url = Some(url.into());
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Whether the store endpoint is usable
    pub fn has_store(&self) -> bool {
        !self.store_url.is_empty() && !self.api_key.is_empty()
    }
}
