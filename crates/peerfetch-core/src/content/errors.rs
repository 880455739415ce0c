//! Transfer error types.
//!
//! Like the state enums, errors are serializable so adapters can report them
//! without holding on to the failing transfer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::TransferState;

/// Error type for content retrieval.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferError {
    /// No provider could produce a transfer for the request.
    #[error("No provider could service the request ({providers} consulted)")]
    NoProviders {
        /// How many providers were asked.
        providers: usize,
    },

    /// Content was requested before the transfer completed.
    #[error("Transfer not completed (state: {state})")]
    NotCompleted {
        /// State the transfer was in.
        state: TransferState,
    },

    /// The transfer was cancelled.
    #[error("Transfer cancelled")]
    Cancelled,

    /// Every candidate transfer failed.
    #[error("All {attempts} transfers failed")]
    AllTransfersFailed {
        /// Number of transfers that were attempted.
        attempts: usize,
    },

    /// The transfer completed but its content could not be produced.
    #[error("Content unavailable: {message}")]
    ContentUnavailable {
        /// Detailed error message.
        message: String,
    },

    /// The requested content is unknown to the provider.
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found.
        message: String,
    },

    /// Waiting for the outcome timed out.
    #[error("Timed out after {millis} ms")]
    Timeout {
        /// Time waited in milliseconds.
        millis: u64,
    },

    /// A configuration value was rejected.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl TransferError {
    /// Create a no providers error.
    #[must_use]
    pub const fn no_providers(providers: usize) -> Self {
        Self::NoProviders { providers }
    }

    /// Create a not completed error.
    #[must_use]
    pub const fn not_completed(state: TransferState) -> Self {
        Self::NotCompleted { state }
    }

    /// Create an all transfers failed error.
    #[must_use]
    pub const fn all_failed(attempts: usize) -> Self {
        Self::AllTransfersFailed { attempts }
    }

    /// Create a content unavailable error.
    pub fn content_unavailable(message: impl Into<String>) -> Self {
        Self::ContentUnavailable {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn timeout(waited: std::time::Duration) -> Self {
        Self::Timeout {
            millis: waited.as_millis() as u64,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if retrying the whole retrieval could help.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AllTransfersFailed { .. } | Self::Timeout { .. } | Self::ContentUnavailable { .. }
        )
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoProviders { .. } => {
                "No provider can retrieve this content. Is it shared by any peer?".to_string()
            }
            Self::NotCompleted { state } => {
                format!("The content is not available yet (transfer is {state}).")
            }
            Self::Cancelled => "Retrieval was cancelled.".to_string(),
            Self::AllTransfersFailed { attempts } => {
                format!("All {attempts} retrieval attempts failed. You can retry later.")
            }
            Self::ContentUnavailable { message } => format!("Content unavailable: {message}"),
            Self::NotFound { message } => format!("Not found: {message}"),
            Self::Timeout { millis } => format!("Retrieval did not finish within {millis} ms."),
            Self::InvalidConfig { message } => format!("Invalid configuration: {message}"),
            Self::Other { message } => message.clone(),
        }
    }
}

/// Convenience result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;
