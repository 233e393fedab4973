//! Provisioning entry points and environment lifecycle.
//!
//! An [`Orchestrator`] owns everything one local environment consists of:
//! the running networks, their exported metadata, the RPC listener, and the
//! relay scheduler. [`Orchestrator::create_and_export`] and
//! [`Orchestrator::fork_and_export`] build an environment;
//! [`Orchestrator::teardown`] dismantles it so the next run starts clean.
//!
//! Chains are provisioned one at a time in configuration order. The chain
//! provisioned at index `i` is served at `http://localhost:{port}/{i}`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use alloy_primitives::U256;

use crate::chain::{ChainConfig, ChainInfo, ChainSource, Network, NetworkProvisioner, registry};
use crate::config::EnvironmentOptions;
use crate::error::{Error, Result};
use crate::export::export_chains;
use crate::funder::fund_accounts;
use crate::listener::ListenerHandle;
use crate::relay::RelayerSet;
use crate::scheduler::RelayScheduler;
use crate::token::{CanonicalToken, TokenRegistry};

/// Contract receiving seed liquidity after each chain's hook has run.
pub const EXPRESS_SERVICE_CONTRACT: &str = "GMPExpressService";

/// Units of USDC minted to the express service: `1e18`.
pub const EXPRESS_SEED_AMOUNT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Owner of one local multi-chain environment.
pub struct Orchestrator {
    provisioner: Arc<dyn NetworkProvisioner>,
    relayers: RelayerSet,
    networks: Vec<Box<dyn Network>>,
    chains: Vec<ChainInfo>,
    tokens: TokenRegistry,
    listener: Option<ListenerHandle>,
    scheduler: Option<RelayScheduler>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("relayers", &self.relayers)
            .field("networks", &self.networks.len())
            .field("chains", &self.chains)
            .field("listener", &self.listener)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an idle orchestrator provisioning through `provisioner` and
    /// relaying through `relayers`.
    #[must_use]
    pub fn new(provisioner: Arc<dyn NetworkProvisioner>, relayers: RelayerSet) -> Self {
        Self {
            provisioner,
            relayers,
            networks: Vec::new(),
            chains: Vec::new(),
            tokens: TokenRegistry::new(),
            listener: None,
            scheduler: None,
        }
    }

    /// Metadata of the provisioned chains, in provisioning order.
    #[must_use]
    pub fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    /// Tokens registered by per-chain hooks.
    #[must_use]
    pub const fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Running relay scheduler, if an environment is up.
    #[must_use]
    pub const fn scheduler(&self) -> Option<&RelayScheduler> {
        self.scheduler.as_ref()
    }

    /// Address the RPC listener is bound to, if an environment is up.
    #[must_use]
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(ListenerHandle::local_addr)
    }

    /// Creates fresh chains, funds accounts, exports metadata, and starts
    /// relaying.
    ///
    /// Each chain is seeded from its name; token metadata comes from the
    /// testnet registry on an exact name match. An empty `chains` option
    /// creates the default set. Any environment left from a previous run is
    /// torn down first.
    ///
    /// # Errors
    ///
    /// Returns the first provisioning, hook, funding, export, or listener
    /// failure. Chains after the failing one are not provisioned.
    pub async fn create_and_export(&mut self, options: &EnvironmentOptions) -> Result<()> {
        self.teardown().await;

        let known = registry::testnet();
        let configs = options
            .create_chain_names()
            .iter()
            .enumerate()
            .map(|(index, name)| ChainConfig::seeded(name, index, &known))
            .collect();
        self.bring_up(configs, options).await
    }

    /// Forks the chains of `options.env` matching `options.chains`, funds
    /// accounts, exports metadata, and starts relaying.
    ///
    /// Names match case-insensitively; an empty request forks every chain of
    /// the source. Any environment left from a previous run is torn down
    /// first.
    ///
    /// # Errors
    ///
    /// Returns the first provisioning, hook, funding, export, or listener
    /// failure. Chains after the failing one are not provisioned.
    pub async fn fork_and_export(&mut self, options: &EnvironmentOptions) -> Result<()> {
        self.teardown().await;

        if let ChainSource::Custom(records) = &options.env {
            tracing::info!(chains = records.len(), "forking from a custom chain list");
        }
        let configs = registry::select(options.env.records(), &options.chains)
            .into_iter()
            .map(|record| ChainConfig::forked(record, options.fork.clone()))
            .collect();
        self.bring_up(configs, options).await
    }

    async fn bring_up(
        &mut self,
        configs: Vec<ChainConfig>,
        options: &EnvironmentOptions,
    ) -> Result<()> {
        // Bound before provisioning so exported URLs carry the real port.
        let listener = ListenerHandle::bind(options.port, Vec::new()).await?;
        let port = listener.port();
        self.listener = Some(listener);

        for (index, config) in configs.iter().enumerate() {
            self.provision_one(index, config, port, options).await?;
            if let (Some(listener), Some(network)) = (&self.listener, self.networks.last()) {
                listener.push_upstream(network.endpoint());
            }
        }

        export_chains(&self.chains, &options.chain_output_path).await?;

        for (info, network) in self.chains.iter().zip(&self.networks) {
            self.relayers.register_chain(info, &network.endpoint());
        }
        self.scheduler = Some(RelayScheduler::start(
            self.relayers.clone(),
            options.relay_interval(),
            options.hooks.after_relay.clone(),
        ));
        Ok(())
    }

    async fn provision_one(
        &mut self,
        index: usize,
        config: &ChainConfig,
        port: u16,
        options: &EnvironmentOptions,
    ) -> Result<()> {
        let network = self
            .provisioner
            .provision(config)
            .await
            .map_err(|e| Error::provision(&config.name, e))?;

        let mut info = ChainInfo::new(config, port, index, network.deployed_contracts());
        tracing::info!(
            chain = %info.name,
            chain_id = info.chain_id,
            rpc = %info.rpc,
            "chain provisioned"
        );

        if let Some(callback) = &options.hooks.callback {
            callback
                .on_provisioned(network.as_ref(), &mut info, &mut self.tokens)
                .await
                .map_err(|source| Error::Hook {
                    chain: info.name.clone(),
                    source,
                })?;
        }

        self.seed_express_service(network.as_ref(), &info).await?;
        fund_accounts(network.as_ref(), &options.accounts_to_fund, options.fund_amount).await?;

        self.networks.push(network);
        self.chains.push(info);
        Ok(())
    }

    /// Mints USDC to the express service when both are present on the chain.
    async fn seed_express_service(&self, network: &dyn Network, info: &ChainInfo) -> Result<()> {
        let Some(usdc) = self.tokens.lookup(&info.name, CanonicalToken::Usdc) else {
            tracing::debug!(chain = %info.name, "no USDC registered, express service not seeded");
            return Ok(());
        };
        let Some(&express) = info.deployed_contracts.get(EXPRESS_SERVICE_CONTRACT) else {
            tracing::debug!(chain = %info.name, "no express service deployed");
            return Ok(());
        };
        network
            .give_token(usdc, express, EXPRESS_SEED_AMOUNT)
            .await
            .map_err(|e| Error::funding(&info.name, express, e))?;
        tracing::debug!(chain = %info.name, %express, "express service seeded with USDC");
        Ok(())
    }

    /// Stops the listener and the relay scheduler, stops every node, and
    /// clears all relayer event logs.
    ///
    /// A relay pass already in flight is allowed to finish first. Safe to
    /// call at any time, any number of times.
    pub async fn teardown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop().await;
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
        if !self.networks.is_empty() {
            tracing::info!(chains = self.networks.len(), "stopping local chains");
        }
        self.networks.clear();
        self.relayers.reset_all();
        self.tokens.clear();
        self.chains.clear();
    }
}
