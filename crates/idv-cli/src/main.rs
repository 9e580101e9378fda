//! # idv CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! the subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use idv_cli::settings::ConnectionArgs;
use idv_cli::status::{run_health, run_status, StatusArgs};
use idv_cli::verify::{run_verify, VerifyArgs};

/// Identity-verification workflow CLI.
///
/// Reads `IDV_API_KEY`, `IDV_BASE_URL`, `IDV_TIMEOUT_SECS` and
/// `IDV_SANDBOX` from the environment.
#[derive(Parser, Debug)]
#[command(name = "idv", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full verification session from local files.
    Verify(VerifyArgs),

    /// Show the status (or results) of a verification session.
    Status(StatusArgs),

    /// Check that the verification API is reachable.
    Health,
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    tracing::debug!("idv CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Commands::Verify(args) => run_verify(args, &cli.connection).await,
        Commands::Status(args) => match cli.connection.client() {
            Ok(client) => run_status(args, &client).await,
            Err(e) => Err(e),
        },
        Commands::Health => match cli.connection.client() {
            Ok(client) => run_health(&client).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
