//! Error taxonomy shared by every crate in the workspace
//!
//! Crate-level error enums stay local (`StoreError`, `SyncError`, `PrintError`);
//! each of them maps onto one [`ErrorCategory`] so the UI layer can decide
//! how a failure is surfaced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error category classification
///
/// - `Transport`: feed disconnect, remote read/write failure. Recovered by retry
///   (feed) or revert (write), surfaced as a transient toast.
/// - `DataShape`: malformed change payload, missing item status. Logged, no-op.
/// - `Validation`: rejected at intake before anything is persisted.
/// - `BusinessRule`: explicit rejection with a reason (e.g. cancel window elapsed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transport,
    DataShape,
    Validation,
    BusinessRule,
}

impl ErrorCategory {
    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::DataShape => "data_shape",
            Self::Validation => "validation",
            Self::BusinessRule => "business_rule",
        }
    }

    /// Transient failures are shown as a dismissable toast and never end the session.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Whether the failure is reported back to the user who submitted the action.
    pub fn is_reported_to_submitter(&self) -> bool {
        matches!(self, Self::Validation | Self::BusinessRule)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
