//! CLI entry point.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use peerfetch_cli::{Cli, Commands, handlers};

/// Log to stderr so stdout stays clean for reports.
///
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads PEERFETCH_*
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let result = match command {
        Commands::Race(args) => handlers::race::execute(&args).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
    Ok(())
}
