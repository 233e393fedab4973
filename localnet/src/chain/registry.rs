//! Static chain registries and fork-source selection.

use std::collections::HashSet;

use serde::Deserialize;

use super::config::ChainRecord;
use crate::error::Error;

struct KnownChain {
    name: &'static str,
    chain_id: u64,
    rpc: &'static str,
    token_name: &'static str,
    token_symbol: &'static str,
}

const MAINNET: &[KnownChain] = &[
    KnownChain {
        name: "Ethereum",
        chain_id: 1,
        rpc: "https://eth.llamarpc.com",
        token_name: "Ether",
        token_symbol: "ETH",
    },
    KnownChain {
        name: "Avalanche",
        chain_id: 43114,
        rpc: "https://api.avax.network/ext/bc/C/rpc",
        token_name: "Avax",
        token_symbol: "AVAX",
    },
    KnownChain {
        name: "Fantom",
        chain_id: 250,
        rpc: "https://rpc.ftm.tools",
        token_name: "Fantom",
        token_symbol: "FTM",
    },
    KnownChain {
        name: "Moonbeam",
        chain_id: 1284,
        rpc: "https://rpc.api.moonbeam.network",
        token_name: "Glimmer",
        token_symbol: "GLMR",
    },
    KnownChain {
        name: "Polygon",
        chain_id: 137,
        rpc: "https://polygon-rpc.com",
        token_name: "Matic",
        token_symbol: "MATIC",
    },
    KnownChain {
        name: "Binance",
        chain_id: 56,
        rpc: "https://bsc-dataseed.binance.org",
        token_name: "Binance Coin",
        token_symbol: "BNB",
    },
    KnownChain {
        name: "Arbitrum",
        chain_id: 42161,
        rpc: "https://arb1.arbitrum.io/rpc",
        token_name: "Ether",
        token_symbol: "ETH",
    },
];

const TESTNET: &[KnownChain] = &[
    KnownChain {
        name: "Ethereum",
        chain_id: 11_155_111,
        rpc: "https://rpc.sepolia.org",
        token_name: "Ether",
        token_symbol: "ETH",
    },
    KnownChain {
        name: "Avalanche",
        chain_id: 43113,
        rpc: "https://api.avax-test.network/ext/bc/C/rpc",
        token_name: "Avax",
        token_symbol: "AVAX",
    },
    KnownChain {
        name: "Fantom",
        chain_id: 4002,
        rpc: "https://rpc.testnet.fantom.network",
        token_name: "Fantom",
        token_symbol: "FTM",
    },
    KnownChain {
        name: "Moonbeam",
        chain_id: 1287,
        rpc: "https://rpc.api.moonbase.moonbeam.network",
        token_name: "DEV",
        token_symbol: "DEV",
    },
    KnownChain {
        name: "Polygon",
        chain_id: 80002,
        rpc: "https://rpc-amoy.polygon.technology",
        token_name: "Matic",
        token_symbol: "MATIC",
    },
    KnownChain {
        name: "Binance",
        chain_id: 97,
        rpc: "https://data-seed-prebsc-1-s1.binance.org:8545",
        token_name: "Binance Coin",
        token_symbol: "BNB",
    },
];

fn records(known: &[KnownChain]) -> Vec<ChainRecord> {
    known
        .iter()
        .map(|chain| ChainRecord {
            name: chain.name.to_owned(),
            chain_id: chain.chain_id,
            rpc: chain.rpc.to_owned(),
            token_name: Some(chain.token_name.to_owned()),
            token_symbol: Some(chain.token_symbol.to_owned()),
        })
        .collect()
}

/// Mainnet chain metadata.
#[must_use]
pub fn mainnet() -> Vec<ChainRecord> {
    records(MAINNET)
}

/// Testnet chain metadata.
#[must_use]
pub fn testnet() -> Vec<ChainRecord> {
    records(TESTNET)
}

/// Source list for fork mode.
///
/// Deserialised from either `"mainnet"`, `"testnet"`, or an inline array of
/// [`ChainRecord`] tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawChainSource")]
pub enum ChainSource {
    /// The built-in mainnet registry.
    #[default]
    Mainnet,
    /// The built-in testnet registry.
    Testnet,
    /// A caller-supplied list.
    Custom(Vec<ChainRecord>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChainSource {
    Named(String),
    Custom(Vec<ChainRecord>),
}

impl TryFrom<RawChainSource> for ChainSource {
    type Error = Error;

    fn try_from(raw: RawChainSource) -> Result<Self, Self::Error> {
        match raw {
            RawChainSource::Named(name) => name.parse(),
            RawChainSource::Custom(records) => Ok(Self::Custom(records)),
        }
    }
}

impl std::str::FromStr for ChainSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(Error::config(format!(
                "unknown chain environment '{other}', expected 'mainnet', 'testnet' or a list of chains"
            ))),
        }
    }
}

impl ChainSource {
    /// Resolves the source into concrete records.
    #[must_use]
    pub fn records(&self) -> Vec<ChainRecord> {
        match self {
            Self::Mainnet => mainnet(),
            Self::Testnet => testnet(),
            Self::Custom(records) => records.clone(),
        }
    }
}

/// Keeps the `source` entries whose name case-insensitively matches any of
/// `requested`, preserving source order and yielding at most one entry per
/// name. An empty request list selects every entry.
#[must_use]
pub fn select(source: Vec<ChainRecord>, requested: &[String]) -> Vec<ChainRecord> {
    let wanted: HashSet<String> = requested.iter().map(|name| name.to_lowercase()).collect();
    let mut seen = HashSet::new();
    source
        .into_iter()
        .filter(|record| {
            let key = record.name.to_lowercase();
            (wanted.is_empty() || wanted.contains(&key)) && seen.insert(key)
        })
        .collect()
}
