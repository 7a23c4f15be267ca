//! Comanda order synchronization engine
//!
//! Keeps a live, eventually-consistent view of a restaurant's orders on top of
//! a hosted order table and its change feed, and reconciles staff actions
//! optimistically against it.
//!
//! # Layout
//!
//! - [`store`]: durable table and change-feed seams (REST + in-memory)
//! - [`cache`]: pending / completed collections
//! - [`subscription`]: change-feed supervisor and catch-up resync
//! - [`reconciler`]: optimistic commands with revert on failure
//! - [`aggregator`]: memoized product / customer statistics
//! - [`outbound`]: fire-and-forget prints and notifications with retry
//! - [`engine`]: the instance tying it all together

pub mod aggregator;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod daily;
pub mod engine;
pub mod error;
pub mod intake;
pub mod logger;
pub mod notice;
pub mod outbound;
pub mod printing;
pub mod reconciler;
pub mod status;
pub mod store;
pub mod subscription;
pub mod tasks;

// Re-exports
pub use aggregator::{Aggregator, CustomerStat, OrderSummary, ProductStat};
pub use cache::{CacheSnapshot, Membership, MergeOutcome, OrderCache};
pub use cancel::Cancellation;
pub use config::{OutboundConfig, RemoteConfig, SyncConfig};
pub use engine::{EngineBuilder, OrderSyncEngine};
pub use error::{NotifyError, StoreError, StoreResult, SyncError, SyncResult};
pub use intake::{NewOrderRequest, PaymentInput};
pub use notice::{Notice, NoticeBus, NoticeLevel};
pub use outbound::{OutboundJob, OutboundQueue, OutboundStatsSnapshot, StatusNotifier, WebhookNotifier};
pub use reconciler::{OptimisticCommand, Reconciliation};
pub use status::StatusReport;
pub use store::{ChangeFeed, MemoryOrderStore, OrderQuery, OrderStore, RestOrderStore};
pub use subscription::{SubscriptionManager, Visibility};

/// Load `.env` and initialize logging from `LOG_LEVEL`, `LOG_JSON` and
/// `LOG_DIR`
pub fn setup_environment() {
    dotenv::dotenv().ok();

    let level = std::env::var("LOG_LEVEL").ok();
    let json = std::env::var("LOG_JSON").is_ok_and(|v| matches!(v.trim(), "1" | "true"));
    let dir = std::env::var("LOG_DIR").ok();
    logger::init_logger_with_file(level.as_deref(), json, dir.as_deref());
}
