//! Commands enum and their arguments.
//!
//! Every race option can also be set through a `PEERFETCH_*` environment
//! variable (a `.env` file is loaded at startup).

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Race in-memory providers for one piece of content
    Race(RaceArgs),
}

/// Options for `peerfetch race`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RaceArgs {
    /// Number of providers to race
    #[arg(short, long, env = "PEERFETCH_PROVIDERS", default_value_t = 4)]
    pub providers: usize,

    /// Payload size in bytes
    #[arg(short, long, env = "PEERFETCH_SIZE", default_value_t = 64 * 1024)]
    pub size: usize,

    /// How many providers fail partway through
    #[arg(short, long, env = "PEERFETCH_FAIL", default_value_t = 0)]
    pub fail: usize,

    /// Seed for the roster shuffle (random when omitted)
    #[arg(long, env = "PEERFETCH_SEED")]
    pub seed: Option<u64>,

    /// Give up after this many milliseconds
    #[arg(long = "timeout-ms", env = "PEERFETCH_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Keep a failed transfer selected instead of promoting a standby
    #[arg(long, env = "PEERFETCH_RETAIN_FAILED")]
    pub retain_failed: bool,

    /// Print a JSON report instead of a live event log
    #[arg(long)]
    pub json: bool,
}
