//! Command-line interface for peerfetch.
//!
//! - `parser` / `commands` - clap definitions
//! - `handlers` - command execution
//! - `presentation` - terminal and JSON output
//! - `error` - exit code mapping

pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use commands::{Commands, RaceArgs};
pub use error::CliError;
pub use parser::Cli;
