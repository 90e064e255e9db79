//! rpc-fallback CLI
//!
//! Resolves a read provider from a TOML configuration file and reports it, or
//! performs one read call through it.
//!
//! ```sh
//! rpc-fallback init                              # Generate default config.toml
//! rpc-fallback resolve --token bsc               # Print the resolved provider
//! rpc-fallback call --token bsc eth_blockNumber  # One read call
//! ```

mod cmd;
mod signal;
mod telemetry;

use clap::Parser;
use cmd::{Cli, Commands};
use telemetry::Telemetry;

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_log_level(cli.log_level.as_str())
        .register();

    let result = match cli.command {
        Commands::Init { output, force } => cmd::init::run(&output, force).map_err(Into::into),
        Commands::Resolve { target } => cmd::resolve::run(&target).await,
        Commands::Call {
            target,
            method,
            params,
        } => cmd::call::run(&target, &method, &params).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
