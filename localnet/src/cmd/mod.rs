//! CLI definitions and command implementations for `localnet`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use localnet::chain::ChainSource;

pub mod chains;
pub mod init;
pub mod up;

/// Local multi-chain environments with cross-chain relaying.
#[derive(Debug, Parser)]
#[command(name = "localnet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the environment-running subcommands.
#[derive(Debug, clap::Args)]
pub struct UpArgs {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(short, long, env = "LOCALNET_CONFIG")]
    pub config: Option<PathBuf>,

    /// `anvil` binary to run instead of the one on `PATH`.
    #[arg(long, env = "ANVIL_PATH")]
    pub anvil: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a default TOML configuration file.
    Init {
        /// Output path for the configuration file.
        #[arg(short, long, default_value = "localnet.toml")]
        output: PathBuf,

        /// Overwrite the file if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Create fresh local chains and relay between them until interrupted.
    Create(UpArgs),

    /// Fork existing chains locally and relay between them until interrupted.
    Fork(UpArgs),

    /// List the chains of a built-in registry.
    Chains {
        /// Registry to list: `mainnet` or `testnet`.
        #[arg(long, default_value = "mainnet")]
        env: ChainSource,
    },
}
