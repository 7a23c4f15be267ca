//! Error types for the sync engine
//!
//! - [`StoreError`]: remote store / change feed transport
//! - [`NotifyError`]: status notification webhook
//! - [`OutboundError`]: any outbound delivery (print or notify)
//! - [`SyncError`]: engine operations, mapped onto [`ErrorCategory`]

use comanda_printer::PrintError;
use shared::ErrorCategory;
use thiserror::Error;

/// Remote store and change-feed errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Network / transport failure
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Store answered with a non-success status
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Timeout waiting for the store
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No row with that identity
    #[error("Row not found: {0}")]
    NotFound(String),

    /// Missing URL / API key
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Status notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Notification webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Connection(e.to_string())
    }
}

/// Failure of one outbound delivery attempt
#[derive(Debug, Error)]
pub enum OutboundError {
    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl OutboundError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Print(e) => e.is_retryable(),
            Self::Notify(e) => e.is_retryable(),
        }
    }
}

/// Engine-level errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rejected at intake, nothing persisted
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Explicit business-rule rejection
    #[error("Rejected: {reason}")]
    Rejected { reason: String },

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Engine already disposed (or not initialized)
    #[error("Engine is not running")]
    Disposed,
}

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Taxonomy bucket deciding how the failure is surfaced
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(_) | Self::Disposed => ErrorCategory::Transport,
            Self::InvalidPayload(_) => ErrorCategory::DataShape,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Rejected { .. } | Self::NotFound(_) => ErrorCategory::BusinessRule,
        }
    }

    /// Short toast text for the UI
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(_) => "No se pudo contactar al servidor".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Rejected { reason } => reason.clone(),
            Self::NotFound(what) => format!("No encontrado: {what}"),
            Self::InvalidPayload(_) => "Datos inválidos".to_string(),
            Self::Disposed => "Sesión cerrada".to_string(),
        }
    }
}

/// Result type for engine operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let store: SyncError = StoreError::Timeout("t".into()).into();
        assert_eq!(store.category(), ErrorCategory::Transport);
        assert!(store.category().is_transient());

        let rejected = SyncError::rejected("too old");
        assert_eq!(rejected.category(), ErrorCategory::BusinessRule);
        assert_eq!(rejected.user_message(), "too old");

        assert_eq!(
            SyncError::validation("nombre requerido").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            SyncError::InvalidPayload("x".into()).category(),
            ErrorCategory::DataShape
        );
    }

    #[test]
    fn test_notify_retryable() {
        assert!(NotifyError::Connection("x".into()).is_retryable());
        assert!(!NotifyError::Rejected { status: 400, body: String::new() }.is_retryable());
    }
}
