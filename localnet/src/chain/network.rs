//! Capability traits for provisioned chains and the backends creating them.

use std::collections::BTreeMap;

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use url::Url;

use super::config::ChainConfig;
use crate::error::BoxError;

/// Handle to one running local chain.
///
/// Dropping the handle stops the underlying node.
#[async_trait]
pub trait Network: Send + Sync {
    /// Chain name.
    fn name(&self) -> &str;

    /// Direct endpoint of the node, bypassing the listener.
    fn endpoint(&self) -> Url;

    /// Account every funding transfer originates from.
    fn funding_account(&self) -> Address;

    /// Contracts present on the chain right after provisioning.
    fn deployed_contracts(&self) -> BTreeMap<String, Address> {
        BTreeMap::new()
    }

    /// Sends `amount` of native currency to `to` from the funding account and
    /// resolves once the transfer is confirmed.
    async fn transfer(&self, to: Address, amount: U256) -> Result<TxHash, BoxError>;

    /// Mints `amount` units of the ERC-20 `token` to `to`.
    async fn give_token(&self, token: Address, to: Address, amount: U256)
    -> Result<(), BoxError>;
}

/// Creates or forks local chains.
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    /// Starts a chain described by `config`.
    async fn provision(&self, config: &ChainConfig) -> Result<Box<dyn Network>, BoxError>;
}
