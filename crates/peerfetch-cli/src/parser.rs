//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for racing redundant content transfers.
#[derive(Parser)]
#[command(name = "peerfetch")]
#[command(about = "Race redundant content transfers and keep the first to finish")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
