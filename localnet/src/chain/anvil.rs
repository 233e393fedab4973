//! [`NetworkProvisioner`] backed by local `anvil` processes.

use std::fmt;
use std::path::PathBuf;

use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_node_bindings::{Anvil, AnvilInstance};
use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use url::Url;

use super::config::{ChainConfig, ChainOrigin};
use super::network::{Network, NetworkProvisioner};
use crate::error::BoxError;

sol! {
    interface IMintableToken {
        function mint(address to, uint256 amount) external;
    }
}

/// Spawns one `anvil` node per provisioned chain.
#[derive(Debug, Clone, Default)]
pub struct AnvilProvisioner {
    program: Option<PathBuf>,
}

impl AnvilProvisioner {
    /// Uses the `anvil` binary found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the `anvil` binary at `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(path.into()),
        }
    }

    fn command(&self, config: &ChainConfig) -> Anvil {
        let anvil = self
            .program
            .as_ref()
            .map_or_else(Anvil::new, Anvil::at)
            .chain_id(config.chain_id);

        match &config.origin {
            ChainOrigin::Seed(seed) => {
                anvil.args(["--mnemonic-seed-unsafe".to_owned(), seed.to_string()])
            }
            ChainOrigin::Fork { source, options } => {
                let mut anvil = anvil.fork(source.rpc.clone());
                if let Some(block_number) = options.block_number {
                    anvil = anvil.fork_block_number(block_number);
                }
                if let Some(block_time) = options.block_time {
                    anvil = anvil.block_time(block_time);
                }
                anvil.args(options.args.iter().cloned())
            }
        }
    }
}

#[async_trait]
impl NetworkProvisioner for AnvilProvisioner {
    async fn provision(&self, config: &ChainConfig) -> Result<Box<dyn Network>, BoxError> {
        let anvil = self.command(config);
        // try_spawn blocks until the node prints its listening address
        let instance = tokio::task::spawn_blocking(move || anvil.try_spawn()).await??;

        let signer: PrivateKeySigner = instance
            .keys()
            .first()
            .cloned()
            .ok_or("node exposed no dev accounts")?
            .into();
        let funder = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(instance.endpoint_url())
            .erased();

        tracing::debug!(
            chain = %config.name,
            endpoint = %instance.endpoint(),
            %funder,
            "anvil node started"
        );

        Ok(Box::new(AnvilNetwork {
            name: config.name.clone(),
            instance,
            provider,
            funder,
        }))
    }
}

/// A running `anvil` node with a provider signing as its first dev account.
pub struct AnvilNetwork {
    name: String,
    instance: AnvilInstance,
    provider: DynProvider,
    funder: Address,
}

impl fmt::Debug for AnvilNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnvilNetwork")
            .field("name", &self.name)
            .field("endpoint", &self.instance.endpoint())
            .field("funder", &self.funder)
            .finish_non_exhaustive()
    }
}

impl AnvilNetwork {
    async fn submit(&self, tx: TransactionRequest) -> Result<TxHash, BoxError> {
        let receipt = self.provider.send_transaction(tx).await?.get_receipt().await?;
        let hash = receipt.transaction_hash();
        if !receipt.status() {
            return Err(format!("transaction {hash} reverted").into());
        }
        Ok(hash)
    }
}

#[async_trait]
impl Network for AnvilNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Url {
        self.instance.endpoint_url()
    }

    fn funding_account(&self) -> Address {
        self.funder
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<TxHash, BoxError> {
        let tx = TransactionRequest::default()
            .with_from(self.funder)
            .with_to(to)
            .with_value(amount);
        self.submit(tx).await
    }

    async fn give_token(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), BoxError> {
        let input = IMintableToken::mintCall { to, amount }.abi_encode();
        let tx = TransactionRequest::default()
            .with_from(self.funder)
            .with_to(token)
            .with_input(input);
        self.submit(tx).await.map(|_| ())
    }
}
