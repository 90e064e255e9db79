//! CLI definitions and command implementations.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rpc_fallback::{Error, NetworkIdentifier, ProviderConfig, load_config};

pub mod call;
pub mod init;
pub mod resolve;

/// Resolve blockchain RPC backends into one quorum-reconciled read provider.
#[derive(Debug, Parser)]
#[command(name = "rpc-fallback")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a default TOML configuration file.
    Init {
        /// Output path for the configuration file.
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite the file if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Resolve a provider and print it as JSON.
    Resolve {
        #[command(flatten)]
        target: Target,
    },

    /// Perform one read call through the resolved provider.
    Call {
        #[command(flatten)]
        target: Target,

        /// JSON-RPC method, e.g. `eth_blockNumber`.
        method: String,

        /// Positional params as a JSON array.
        #[arg(default_value = "[]")]
        params: String,
    },
}

/// Which `[[providers]]` entry to resolve.
#[derive(Debug, Args)]
pub struct Target {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Entry token; the first entry when omitted.
    #[arg(short, long)]
    pub token: Option<String>,

    /// Overrides the entry's network (chain id or name).
    #[arg(short, long)]
    pub network: Option<NetworkIdentifier>,
}

impl Target {
    /// Loads the file and returns the selected entry with the network override applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be loaded or no entry matches.
    pub fn provider_config(&self) -> Result<ProviderConfig, Error> {
        let providers = load_config(&self.config)?;
        let mut config = providers.select(self.token.as_deref())?.clone();
        if let Some(network) = &self.network {
            config.network = Some(network.clone());
        }
        Ok(config)
    }
}
