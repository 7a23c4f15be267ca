//! Error types for ticket delivery

use thiserror::Error;

/// Print error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// HTTP transport error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Print service answered with a non-success status
    #[error("Print service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Timeout waiting for the print service
    #[error("Timeout: {0}")]
    Timeout(String),

    /// No destination configured, bad URL, etc.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PrintError {
    /// Whether retrying the same delivery may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidConfig(_) => false,
        }
    }
}

impl From<reqwest::Error> for PrintError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_builder() {
            Self::InvalidConfig(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// Result type for print operations
pub type PrintResult<T> = Result<T, PrintError>;
