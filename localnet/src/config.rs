//! Environment options, configuration loading and default template generation.
//!
//! This module provides:
//!
//! - [`EnvironmentOptions`]: Everything a provisioning run needs, with the
//!   defaults applied for absent fields.
//! - [`Hooks`]: Programmatic per-chain and per-relay callbacks.
//! - [`load_config`]: Reads and parses a TOML configuration file.
//! - [`generate_default_config`]: Produces a commented TOML template.
//!
//! # Configuration File Format
//!
//! ```toml
//! chain_output_path = "./local.json"
//! port = 8500
//! relay_interval_ms = 2000
//! chains = ["Avalanche", "Polygon"]
//! accounts_to_fund = ["0x70997970C51812dc3A010C7d01b50e0d17dc79C8"]
//!
//! env = "testnet"
//!
//! [fork]
//! block_number = 19000000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;

use crate::chain::{ChainInfo, ChainSource, ForkOptions, Network};
use crate::error::{BoxError, Error, Result};
use crate::scheduler::AfterRelay;
use crate::token::TokenRegistry;

/// Chains created when create mode is given no explicit list.
pub const DEFAULT_CREATE_CHAINS: [&str; 5] =
    ["Moonbeam", "Avalanche", "Fantom", "Ethereum", "Polygon"];

/// Native amount sent to every funded account: 100 ether.
pub const DEFAULT_FUND_AMOUNT: U256 = U256::from_limbs([0x6bc7_5e2d_6310_0000, 0x5, 0, 0]);

/// Per-chain hook run after a chain is provisioned and before its accounts
/// are funded.
///
/// The hook may deploy contracts, record them in `info`, and register
/// well-known tokens in `tokens`.
#[async_trait]
pub trait ChainHook: Send + Sync {
    /// Called once per provisioned chain.
    async fn on_provisioned(
        &self,
        network: &dyn Network,
        info: &mut ChainInfo,
        tokens: &mut TokenRegistry,
    ) -> Result<(), BoxError>;
}

/// Caller-supplied callbacks for a provisioning run.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Per-chain post-provision hook.
    pub callback: Option<Arc<dyn ChainHook>>,
    /// Invoked with each backend's relay data after every relay pass.
    pub after_relay: Option<AfterRelay>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("callback", &self.callback.is_some())
            .field("after_relay", &self.after_relay.is_some())
            .finish()
    }
}

/// Options for one provisioning run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentOptions {
    /// Where the chain metadata is exported.
    pub chain_output_path: PathBuf,
    /// Accounts receiving `fund_amount` on every chain, in order.
    pub accounts_to_fund: Vec<Address>,
    /// Native amount sent to each funded account, in wei.
    pub fund_amount: U256,
    /// Requested chain names. Create mode falls back to
    /// [`DEFAULT_CREATE_CHAINS`]; fork mode forks the whole source.
    pub chains: Vec<String>,
    /// Relay poll period in milliseconds.
    pub relay_interval_ms: u64,
    /// Listener base port.
    pub port: u16,
    /// Fork source.
    pub env: ChainSource,
    /// Node options applied to every fork.
    pub fork: ForkOptions,
    /// Programmatic callbacks.
    #[serde(skip)]
    pub hooks: Hooks,
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            chain_output_path: PathBuf::from("./local.json"),
            accounts_to_fund: Vec::new(),
            fund_amount: DEFAULT_FUND_AMOUNT,
            chains: Vec::new(),
            relay_interval_ms: 2000,
            port: 8500,
            env: ChainSource::default(),
            fork: ForkOptions::default(),
            hooks: Hooks::default(),
        }
    }
}

impl EnvironmentOptions {
    /// Relay poll period.
    #[must_use]
    pub const fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_ms)
    }

    /// Chain names to create, applying the create-mode default.
    #[must_use]
    pub fn create_chain_names(&self) -> Vec<String> {
        if self.chains.is_empty() {
            DEFAULT_CREATE_CHAINS.iter().map(|&name| name.to_owned()).collect()
        } else {
            self.chains.clone()
        }
    }

    /// Sets the per-chain hook.
    #[must_use]
    pub fn with_callback(mut self, callback: Arc<dyn ChainHook>) -> Self {
        self.hooks.callback = Some(callback);
        self
    }

    /// Sets the after-relay hook.
    #[must_use]
    pub fn with_after_relay(mut self, after_relay: AfterRelay) -> Self {
        self.hooks.after_relay = Some(after_relay);
        self
    }
}

/// Resolve an environment-variable reference (`$VAR` or `${VAR}`), returning
/// the literal string unchanged if it does not match either pattern.
fn resolve_env(value: &str) -> Result<String> {
    let var_name = if let Some(name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        name
    } else if let Some(name) = value
        .strip_prefix('$')
        .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_'))
    {
        name
    } else {
        return Ok(value.to_owned());
    };
    std::env::var(var_name).map_err(|e| {
        Error::config_with(
            format!("env var '{var_name}' not found (referenced as '{value}')"),
            e,
        )
    })
}

/// Load options from a TOML file at the given path.
///
/// Fork source RPC URLs of the form `$VAR` / `${VAR}` are resolved from the
/// environment.
///
/// # Errors
///
/// Returns an error if the file cannot be resolved, read, or parsed, or if a
/// referenced environment variable is missing.
pub fn load_config(path: &Path) -> Result<EnvironmentOptions> {
    let config_path = path.canonicalize().map_err(|e| {
        Error::config_with(format!("failed to resolve config path '{}'", path.display()), e)
    })?;
    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        Error::config_with(
            format!("failed to read config file '{}'", config_path.display()),
            e,
        )
    })?;
    parse_config(&content).map_err(|e| match e {
        Error::Config { message, source } => Error::Config {
            message: format!("'{}': {message}", config_path.display()),
            source,
        },
        other => other,
    })
}

/// Parse options from TOML text.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or an environment reference
/// cannot be resolved.
pub fn parse_config(content: &str) -> Result<EnvironmentOptions> {
    let mut options: EnvironmentOptions =
        toml::from_str(content).map_err(|e| Error::config_with("failed to parse TOML", e))?;
    if let ChainSource::Custom(records) = &mut options.env {
        for record in records {
            record.rpc = resolve_env(&record.rpc)?;
        }
    }
    Ok(options)
}

/// Generate a default TOML configuration template.
#[must_use]
pub fn generate_default_config() -> String {
    String::from(
        r#"# localnet configuration

# Where the provisioned chain metadata is written.
chain_output_path = "./local.json"

# Listener base port; chain i is reachable at http://localhost:<port>/<i>.
port = 8500

# Relay poll period in milliseconds.
relay_interval_ms = 2000

# Chains to provision, matched case-insensitively in fork mode.
# Create mode defaults to Moonbeam, Avalanche, Fantom, Ethereum, Polygon;
# fork mode defaults to every chain of the source.
chains = []

# Accounts funded on every chain, and the amount in wei (default 100 ether).
accounts_to_fund = []
# fund_amount = "100000000000000000000"

# ── Fork mode ───────────────────────────────────────────────────────
# "mainnet", "testnet", or an inline list of chains:
#
# [[env]]
# name = "Ethereum"
# chain_id = 1
# rpc = "$ETHEREUM_RPC_URL"
# token_name = "Ether"
# token_symbol = "ETH"
env = "mainnet"

[fork]
# block_number = 19000000
# block_time = 2
# args = ["--no-rate-limit"]
"#,
    )
}
