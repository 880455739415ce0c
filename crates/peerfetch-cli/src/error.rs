//! CLI-specific error types and mappings.
//!
//! Maps transfer errors to exit codes and user-facing messages.

use peerfetch_core::TransferError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The race ended without content.
    #[error("{}", .0.user_message())]
    Transfer(TransferError),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Transfer(TransferError::InvalidConfig { .. }) => 78, // EX_CONFIG
            Self::Transfer(TransferError::Timeout { .. }) => 75,       // EX_TEMPFAIL
            Self::Transfer(TransferError::AllTransfersFailed { .. }) => 69, // EX_UNAVAILABLE
            Self::Transfer(_) => 1,
            Self::Output(_) => 74, // EX_IOERR
        }
    }
}

impl From<TransferError> for CliError {
    fn from(err: TransferError) -> Self {
        Self::Transfer(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}
