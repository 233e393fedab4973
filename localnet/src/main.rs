//! `localnet` command-line interface.
//!
//! ```sh
//! localnet init                 # Generate default localnet.toml
//! localnet create -c localnet.toml
//! localnet fork -c localnet.toml
//! localnet chains --env testnet
//! ```

mod cmd;

use clap::Parser;
use cmd::{Cli, Commands};
use cmd::up::Mode;

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { output, force } => cmd::init::run(&output, force).map_err(Into::into),
        Commands::Create(args) => cmd::up::run(&args, Mode::Create).await,
        Commands::Fork(args) => cmd::up::run(&args, Mode::Fork).await,
        Commands::Chains { env } => {
            cmd::chains::run(&env);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
