//! In-memory doubles for networks, provisioners and relayers.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, B256, TxHash, U256};
use async_trait::async_trait;
use url::Url;

use crate::chain::{ChainConfig, ChainInfo, Network, NetworkProvisioner};
use crate::error::BoxError;
use crate::relay::{ChainFamily, RelayData, RelayError, Relayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferStep {
    Submitted(Address),
    Confirmed(Address),
}

#[derive(Debug, Clone)]
pub(crate) struct MockNetwork {
    name: String,
    endpoint: Url,
    contracts: BTreeMap<String, Address>,
    failing_to: Option<Address>,
    steps: Arc<Mutex<Vec<TransferStep>>>,
    minted: Arc<Mutex<Vec<(Address, Address, U256)>>>,
}

impl MockNetwork {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            endpoint: Url::parse("http://127.0.0.1:9/").expect("static url"),
            contracts: BTreeMap::new(),
            failing_to: None,
            steps: Arc::default(),
            minted: Arc::default(),
        }
    }

    pub(crate) fn failing_transfer_to(mut self, account: Address) -> Self {
        self.failing_to = Some(account);
        self
    }

    pub(crate) fn steps(&self) -> Vec<TransferStep> {
        self.steps.lock().expect("steps lock").clone()
    }

    pub(crate) fn minted(&self) -> Vec<(Address, Address, U256)> {
        self.minted.lock().expect("minted lock").clone()
    }
}

#[async_trait]
impl Network for MockNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Url {
        self.endpoint.clone()
    }

    fn funding_account(&self) -> Address {
        Address::repeat_byte(0xf0)
    }

    fn deployed_contracts(&self) -> BTreeMap<String, Address> {
        self.contracts.clone()
    }

    async fn transfer(&self, to: Address, _amount: U256) -> Result<TxHash, BoxError> {
        self.steps
            .lock()
            .expect("steps lock")
            .push(TransferStep::Submitted(to));
        tokio::time::sleep(Duration::from_millis(10)).await;
        if self.failing_to == Some(to) {
            return Err(format!("transfer to {to} rejected").into());
        }
        let mut steps = self.steps.lock().expect("steps lock");
        steps.push(TransferStep::Confirmed(to));
        Ok(B256::with_last_byte(u8::try_from(steps.len()).unwrap_or(u8::MAX)))
    }

    async fn give_token(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), BoxError> {
        self.minted
            .lock()
            .expect("minted lock")
            .push((token, to, amount));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockProvisioner {
    failing_chain: Option<String>,
    failing_account: Option<Address>,
    contracts: BTreeMap<String, Address>,
    provisioned: Arc<Mutex<Vec<ChainConfig>>>,
    networks: Arc<Mutex<Vec<MockNetwork>>>,
}

impl MockProvisioner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, chain: &str) -> Self {
        self.failing_chain = Some(chain.to_owned());
        self
    }

    pub(crate) fn failing_transfer_to(mut self, account: Address) -> Self {
        self.failing_account = Some(account);
        self
    }

    pub(crate) fn with_contract(mut self, name: &str, address: Address) -> Self {
        self.contracts.insert(name.to_owned(), address);
        self
    }

    pub(crate) fn provisioned(&self) -> Vec<ChainConfig> {
        self.provisioned.lock().expect("provisioned lock").clone()
    }

    pub(crate) fn networks(&self) -> Vec<MockNetwork> {
        self.networks.lock().expect("networks lock").clone()
    }
}

#[async_trait]
impl NetworkProvisioner for MockProvisioner {
    async fn provision(&self, config: &ChainConfig) -> Result<Box<dyn Network>, BoxError> {
        self.provisioned
            .lock()
            .expect("provisioned lock")
            .push(config.clone());
        if self.failing_chain.as_deref() == Some(config.name.as_str()) {
            return Err(format!("cannot start {}", config.name).into());
        }

        let mut networks = self.networks.lock().expect("networks lock");
        let mut network = MockNetwork::new(&config.name);
        network.endpoint = Url::parse(&format!("http://127.0.0.1:{}/", 9000 + networks.len()))?;
        network.contracts = self.contracts.clone();
        network.failing_to = self.failing_account;
        networks.push(network.clone());
        Ok(Box::new(network))
    }
}

#[derive(Debug)]
pub(crate) struct MockRelayer {
    name: String,
    delay: Duration,
    failing_passes: HashSet<u64>,
    has_data: bool,
    started: AtomicU64,
    passes: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<u64>>,
    chains: Mutex<Vec<String>>,
}

impl MockRelayer {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            delay: Duration::ZERO,
            failing_passes: HashSet::new(),
            has_data: true,
            started: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            chains: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn fail_on_passes(mut self, passes: impl IntoIterator<Item = u64>) -> Self {
        self.failing_passes.extend(passes);
        self
    }

    pub(crate) fn without_data(mut self) -> Self {
        self.has_data = false;
        self
    }

    pub(crate) fn with_log_entries(self, entries: u64) -> Self {
        self.log.lock().expect("log lock").extend(0..entries);
        self
    }

    pub(crate) fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn registered_chains(&self) -> Vec<String> {
        self.chains.lock().expect("chains lock").clone()
    }
}

#[async_trait]
impl Relayer for MockRelayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn register_chain(&self, info: &ChainInfo, _endpoint: &Url) {
        self.chains
            .lock()
            .expect("chains lock")
            .push(info.name.clone());
    }

    async fn relay(&self) -> Result<(), RelayError> {
        let pass = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.log.lock().expect("log lock").push(pass);
        self.passes.fetch_add(1, Ordering::SeqCst);
        if self.failing_passes.contains(&pass) {
            return Err(RelayError::new(&self.name, format!("pass {pass} failed")));
        }
        Ok(())
    }

    fn relay_data(&self) -> Option<RelayData> {
        let passes = self.passes();
        (self.has_data && passes > 0).then(|| RelayData {
            backend: self.name.clone(),
            family: ChainFamily::Evm,
            passes,
            messages: BTreeMap::new(),
        })
    }

    fn event_log_len(&self) -> usize {
        self.log.lock().expect("log lock").len()
    }

    fn reset(&self) {
        self.log.lock().expect("log lock").clear();
        self.chains.lock().expect("chains lock").clear();
    }
}
