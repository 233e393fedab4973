//! Chain descriptions consumed by the provisioner.

use alloy_primitives::keccak256;
use serde::{Deserialize, Serialize};

/// First chain id handed out to created chains that are unknown to the
/// testnet registry. The provisioning index is added on top.
pub const CREATED_CHAIN_ID_BASE: u64 = 2500;

/// Registry entry describing a known (or caller-supplied) chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    /// Human-readable chain name, e.g. `"Avalanche"`.
    pub name: String,
    /// EIP-155 chain id.
    #[serde(alias = "chainId")]
    pub chain_id: u64,
    /// Upstream RPC URL used as the fork source.
    pub rpc: String,
    /// Native token name.
    #[serde(default, alias = "tokenName")]
    pub token_name: Option<String>,
    /// Native token symbol.
    #[serde(default, alias = "tokenSymbol")]
    pub token_symbol: Option<String>,
}

/// Options forwarded to the node when forking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkOptions {
    /// Block to fork from. Latest when unset.
    pub block_number: Option<u64>,
    /// Interval mining period in seconds. Automine when unset.
    pub block_time: Option<u64>,
    /// Extra command line arguments passed verbatim to the node.
    pub args: Vec<String>,
}

/// Where a provisioned chain's initial state comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOrigin {
    /// Fresh chain whose dev accounts are derived from this seed.
    Seed(u64),
    /// Chain cloned from a live source.
    Fork {
        /// Registry entry being forked.
        source: ChainRecord,
        /// Node options applied to the fork.
        options: ForkOptions,
    },
}

/// Input describing one chain to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Chain name, carried into the exported metadata.
    pub name: String,
    /// Chain id the node will report.
    pub chain_id: u64,
    /// Native token name, when known.
    pub token_name: Option<String>,
    /// Native token symbol, when known.
    pub token_symbol: Option<String>,
    /// Fresh or forked.
    pub origin: ChainOrigin,
}

impl ChainConfig {
    /// Describes a fresh chain named `name`, seeded from the name itself.
    ///
    /// Token metadata and chain id come from the first `known` record whose
    /// name matches exactly; otherwise the token fields stay unset and the
    /// chain id is derived from `index`.
    #[must_use]
    pub fn seeded(name: &str, index: usize, known: &[ChainRecord]) -> Self {
        let record = known.iter().find(|record| record.name == name);
        Self {
            name: name.to_owned(),
            chain_id: record.map_or(CREATED_CHAIN_ID_BASE + index as u64, |r| r.chain_id),
            token_name: record.and_then(|r| r.token_name.clone()),
            token_symbol: record.and_then(|r| r.token_symbol.clone()),
            origin: ChainOrigin::Seed(seed_from_name(name)),
        }
    }

    /// Describes a fork of `source`.
    #[must_use]
    pub fn forked(source: ChainRecord, options: ForkOptions) -> Self {
        Self {
            name: source.name.clone(),
            chain_id: source.chain_id,
            token_name: source.token_name.clone(),
            token_symbol: source.token_symbol.clone(),
            origin: ChainOrigin::Fork { source, options },
        }
    }
}

/// Derives a stable 64-bit node seed from a chain name.
#[must_use]
pub fn seed_from_name(name: &str) -> u64 {
    let hash = keccak256(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(bytes)
}
