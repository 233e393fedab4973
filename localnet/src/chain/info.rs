//! Exported per-chain metadata.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::config::ChainConfig;

/// Metadata for one provisioned chain, as written to the export file.
///
/// Deployed contract addresses are flattened next to the fixed fields, so a
/// chain with a `Gateway` contract serialises as
/// `{"name": .., "rpc": .., "Gateway": "0x.."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Chain name.
    pub name: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Listener URL routing to this chain.
    pub rpc: String,
    /// Native token name.
    pub token_name: Option<String>,
    /// Native token symbol.
    pub token_symbol: Option<String>,
    /// Contracts deployed on the chain, keyed by contract name.
    #[serde(flatten)]
    pub deployed_contracts: BTreeMap<String, Address>,
}

impl ChainInfo {
    /// Builds metadata for the chain provisioned at `index`, routed through
    /// the listener on `port`.
    #[must_use]
    pub fn new(
        config: &ChainConfig,
        port: u16,
        index: usize,
        deployed_contracts: BTreeMap<String, Address>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            chain_id: config.chain_id,
            rpc: rpc_url(port, index),
            token_name: config.token_name.clone(),
            token_symbol: config.token_symbol.clone(),
            deployed_contracts,
        }
    }
}

/// Listener URL for the chain at provisioning `index`.
#[must_use]
pub fn rpc_url(port: u16, index: usize) -> String {
    format!("http://localhost:{port}/{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::config::ChainConfig;

    #[test]
    fn serialises_flat_contracts() {
        let config = ChainConfig::seeded("Moonbeam", 0, &[]);
        let mut contracts = BTreeMap::new();
        contracts.insert("Gateway".to_owned(), Address::repeat_byte(0x11));
        let info = ChainInfo::new(&config, 8500, 2, contracts);

        let value = serde_json::to_value(&info).expect("serialisable");
        assert_eq!(value["rpc"], "http://localhost:8500/2");
        assert_eq!(value["name"], "Moonbeam");
        assert!(value["tokenName"].is_null());
        assert_eq!(
            value["Gateway"].as_str().map(str::to_lowercase),
            Some(format!("0x{}", "11".repeat(20)))
        );
    }
}
