//! Chain descriptions, registries, and node provisioning.
//!
//! - [`config`]: [`ChainConfig`], [`ChainRecord`] and fork options.
//! - [`registry`]: Static mainnet/testnet metadata and fork-source selection.
//! - [`info`]: [`ChainInfo`], the exported per-chain metadata.
//! - [`network`]: [`Network`] / [`NetworkProvisioner`] capability traits.
//! - [`anvil`]: Provisioner spawning local `anvil` nodes.

pub mod anvil;
pub mod config;
pub mod info;
pub mod network;
pub mod registry;

pub use self::anvil::{AnvilNetwork, AnvilProvisioner};
pub use self::config::*;
pub use self::info::*;
pub use self::network::*;
pub use self::registry::ChainSource;
