//! EVM relayer backend.
//!
//! Discovers cross-chain calls by scanning each registered chain for the
//! gas-payment events emitted by its `AxelarGasService` contract. The events
//! are appended to per-kind event logs and exposed through [`RelayData`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, B256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::{Filter, Log};
use alloy_sol_types::{SolEvent, sol};
use url::Url;

use super::{ChainFamily, MessageKind, RelayData, RelayError, RelayMessage, Relayer};
use crate::chain::ChainInfo;

/// Contract name under which chains expose the gas service.
pub const GAS_SERVICE_CONTRACT: &str = "AxelarGasService";

sol! {
    event NativeGasPaidForContractCall(
        address indexed sourceAddress,
        string destinationChain,
        string destinationAddress,
        bytes32 indexed payloadHash,
        uint256 gasFeeAmount,
        address refundAddress
    );

    event NativeGasPaidForContractCallWithToken(
        address indexed sourceAddress,
        string destinationChain,
        string destinationAddress,
        bytes32 indexed payloadHash,
        string symbol,
        uint256 amount,
        uint256 gasFeeAmount,
        address refundAddress
    );
}

#[derive(Clone)]
struct WatchedChain {
    name: String,
    provider: DynProvider,
    gas_service: Address,
}

#[derive(Default)]
struct EvmState {
    chains: Vec<WatchedChain>,
    cursors: BTreeMap<String, u64>,
    passes: u64,
    contract_call_gas_events: Vec<RelayMessage>,
    contract_call_with_token_gas_events: Vec<RelayMessage>,
}

/// Relayer for EVM-family chains.
pub struct EvmRelayer {
    state: Mutex<EvmState>,
}

impl std::fmt::Debug for EvmRelayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("EvmRelayer")
            .field("chains", &state.chains.len())
            .field("passes", &state.passes)
            .finish_non_exhaustive()
    }
}

impl Default for EvmRelayer {
    fn default() -> Self {
        Self::new()
    }
}

impl EvmRelayer {
    /// Creates a relayer watching no chains.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EvmState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EvmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gas-paid events for plain contract calls seen so far.
    #[must_use]
    pub fn contract_call_gas_events(&self) -> Vec<RelayMessage> {
        self.lock().contract_call_gas_events.clone()
    }

    /// Gas-paid events for contract calls with token seen so far.
    #[must_use]
    pub fn contract_call_with_token_gas_events(&self) -> Vec<RelayMessage> {
        self.lock().contract_call_with_token_gas_events.clone()
    }

    /// Scans the blocks after `cursor` up to the current head. A chain seen
    /// for the first time has no cursor and starts at its head, so a fork
    /// never replays the source chain's history.
    async fn scan(
        chain: &WatchedChain,
        cursor: Option<u64>,
    ) -> Result<(u64, Vec<RelayMessage>), RelayError> {
        let latest = chain
            .provider
            .get_block_number()
            .await
            .map_err(|e| RelayError::new("evm", format!("{}: {e}", chain.name)))?;
        let Some(cursor) = cursor else {
            tracing::debug!(chain = %chain.name, block = latest, "watching gas service from head");
            return Ok((latest, Vec::new()));
        };
        let from = cursor + 1;
        if from > latest {
            return Ok((latest, Vec::new()));
        }

        let filter = Filter::new()
            .address(chain.gas_service)
            .from_block(from)
            .to_block(latest);
        let logs = chain
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| RelayError::new("evm", format!("{}: {e}", chain.name)))?;

        let messages = logs
            .iter()
            .filter_map(|log| gas_paid_message(&chain.name, log))
            .collect();
        Ok((latest, messages))
    }
}

fn gas_paid_message(chain: &str, log: &Log) -> Option<RelayMessage> {
    let topics = log.topics();
    let kind = match topics.first()? {
        t if *t == NativeGasPaidForContractCall::SIGNATURE_HASH => MessageKind::ContractCall,
        t if *t == NativeGasPaidForContractCallWithToken::SIGNATURE_HASH => {
            MessageKind::ContractCallWithToken
        }
        _ => return None,
    };
    Some(RelayMessage {
        source_chain: chain.to_owned(),
        tx_hash: log.transaction_hash?,
        log_index: log.log_index?,
        payload_hash: topics.get(2).copied().unwrap_or(B256::ZERO),
        kind,
    })
}

#[async_trait::async_trait]
impl Relayer for EvmRelayer {
    fn name(&self) -> &str {
        "evm"
    }

    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn register_chain(&self, info: &ChainInfo, endpoint: &Url) {
        let Some(gas_service) = info.deployed_contracts.get(GAS_SERVICE_CONTRACT).copied() else {
            tracing::debug!(chain = %info.name, "no gas service deployed, not watching");
            return;
        };
        let provider = ProviderBuilder::new()
            .connect_http(endpoint.clone())
            .erased();
        self.lock().chains.push(WatchedChain {
            name: info.name.clone(),
            provider,
            gas_service,
        });
    }

    async fn relay(&self) -> Result<(), RelayError> {
        let (chains, cursors) = {
            let state = self.lock();
            (state.chains.clone(), state.cursors.clone())
        };

        let mut first_error = None;
        for chain in &chains {
            match Self::scan(chain, cursors.get(&chain.name).copied()).await {
                Ok((latest, messages)) => {
                    let mut state = self.lock();
                    state.cursors.insert(chain.name.clone(), latest);
                    for message in messages {
                        match message.kind {
                            MessageKind::ContractCall => {
                                state.contract_call_gas_events.push(message);
                            }
                            MessageKind::ContractCallWithToken => {
                                state.contract_call_with_token_gas_events.push(message);
                            }
                        }
                    }
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        self.lock().passes += 1;
        first_error.map_or(Ok(()), Err)
    }

    fn relay_data(&self) -> Option<RelayData> {
        let state = self.lock();
        if state.passes == 0 {
            return None;
        }
        let messages = state
            .contract_call_gas_events
            .iter()
            .chain(&state.contract_call_with_token_gas_events)
            .map(|m| (m.command_id(), m.clone()))
            .collect();
        Some(RelayData {
            backend: self.name().to_owned(),
            family: self.family(),
            passes: state.passes,
            messages,
        })
    }

    fn event_log_len(&self) -> usize {
        let state = self.lock();
        state.contract_call_gas_events.len() + state.contract_call_with_token_gas_events.len()
    }

    fn reset(&self) {
        *self.lock() = EvmState::default();
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use alloy_primitives::{Bytes, LogData};
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::chain::ChainConfig;

    /// JSON-RPC node answering `eth_blockNumber` and recording `eth_getLogs`
    /// filters.
    #[derive(Default)]
    struct FakeNode {
        head: AtomicU64,
        log_queries: Mutex<Vec<Value>>,
    }

    impl FakeNode {
        fn log_queries(&self) -> Vec<Value> {
            self.log_queries.lock().expect("queries").clone()
        }
    }

    async fn rpc(State(node): State<Arc<FakeNode>>, Json(request): Json<Value>) -> Json<Value> {
        let result = match request["method"].as_str() {
            Some("eth_blockNumber") => json!(format!("{:#x}", node.head.load(Ordering::SeqCst))),
            Some("eth_getLogs") => {
                node.log_queries
                    .lock()
                    .expect("queries")
                    .push(request["params"][0].clone());
                json!([])
            }
            _ => Value::Null,
        };
        Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
    }

    async fn serve(node: Arc<FakeNode>) -> SocketAddr {
        let app = Router::new().route("/", post(rpc)).with_state(node);
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind fake node");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake node");
        });
        addr
    }

    fn log(topic0: B256, index: u64) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: Address::repeat_byte(9),
                data: LogData::new_unchecked(
                    vec![topic0, B256::repeat_byte(1), B256::repeat_byte(2)],
                    Bytes::new(),
                ),
            },
            transaction_hash: Some(B256::repeat_byte(3)),
            log_index: Some(index),
            ..Log::default()
        }
    }

    #[test]
    fn classifies_gas_paid_events() {
        let call = gas_paid_message("Ethereum", &log(NativeGasPaidForContractCall::SIGNATURE_HASH, 1))
            .expect("contract call");
        assert_eq!(call.kind, MessageKind::ContractCall);
        assert_eq!(call.payload_hash, B256::repeat_byte(2));

        let with_token = gas_paid_message(
            "Ethereum",
            &log(NativeGasPaidForContractCallWithToken::SIGNATURE_HASH, 2),
        )
        .expect("contract call with token");
        assert_eq!(with_token.kind, MessageKind::ContractCallWithToken);

        assert!(gas_paid_message("Ethereum", &log(B256::ZERO, 3)).is_none());
    }

    #[tokio::test]
    async fn no_data_before_first_pass() {
        let relayer = EvmRelayer::new();
        assert!(relayer.relay_data().is_none());

        relayer.relay().await.expect("no chains, nothing to fail");
        let data = relayer.relay_data().expect("data after a pass");
        assert_eq!(data.passes, 1);
        assert!(data.messages.is_empty());
    }

    #[tokio::test]
    async fn first_pass_starts_at_chain_head() {
        let node = Arc::new(FakeNode {
            head: AtomicU64::new(0x0121_eac0),
            ..FakeNode::default()
        });
        let addr = serve(Arc::clone(&node)).await;
        let contracts =
            BTreeMap::from([(GAS_SERVICE_CONTRACT.to_owned(), Address::repeat_byte(7))]);
        let info = ChainInfo::new(&ChainConfig::seeded("Ethereum", 0, &[]), 8500, 0, contracts);
        let relayer = EvmRelayer::new();
        relayer.register_chain(&info, &Url::parse(&format!("http://{addr}/")).expect("url"));

        relayer.relay().await.expect("first pass");
        assert!(node.log_queries().is_empty());

        node.head.store(0x0121_eac3, Ordering::SeqCst);
        relayer.relay().await.expect("second pass");

        let queries = node.log_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0]["fromBlock"], "0x121eac1");
        assert_eq!(queries[0]["toBlock"], "0x121eac3");
        assert_eq!(relayer.relay_data().expect("data").passes, 2);
    }

    #[test]
    fn chains_without_gas_service_are_ignored() {
        let relayer = EvmRelayer::new();
        let info = ChainInfo::new(
            &crate::chain::ChainConfig::seeded("Fantom", 0, &[]),
            8500,
            0,
            BTreeMap::new(),
        );
        let endpoint = Url::parse("http://127.0.0.1:1").expect("url");
        relayer.register_chain(&info, &endpoint);
        assert_eq!(relayer.lock().chains.len(), 0);
    }

    #[test]
    fn reset_clears_event_logs() {
        let relayer = EvmRelayer::new();
        {
            let mut state = relayer.lock();
            let message = gas_paid_message("Ethereum", &log(NativeGasPaidForContractCall::SIGNATURE_HASH, 0))
                .expect("message");
            state.contract_call_gas_events.push(message.clone());
            state.contract_call_with_token_gas_events.push(message);
            state.passes = 4;
        }
        assert_eq!(relayer.event_log_len(), 2);

        relayer.reset();
        assert_eq!(relayer.event_log_len(), 0);
        assert!(relayer.relay_data().is_none());
    }
}
