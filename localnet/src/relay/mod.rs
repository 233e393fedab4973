//! Relayer backends and the uniform interface the scheduler drives.
//!
//! Each chain family ships its own [`Relayer`]; the scheduler only ever sees
//! the trait object and a [`RelayerSet`] fanning out over all of them.

pub mod evm;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use alloy_primitives::B256;
use serde::Serialize;
use url::Url;

use crate::chain::ChainInfo;

pub use self::evm::EvmRelayer;

/// Chain family a relayer backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// EVM-compatible chains.
    Evm,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Evm => "evm",
        })
    }
}

/// Kind of cross-chain message a backend discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// General message passing call.
    ContractCall,
    /// Call carrying a token transfer.
    ContractCallWithToken,
}

/// A message observed on a source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    /// Chain the message originated on.
    pub source_chain: String,
    /// Transaction that emitted it.
    pub tx_hash: B256,
    /// Log index within the transaction's block.
    pub log_index: u64,
    /// Hash of the message payload.
    pub payload_hash: B256,
    /// Message kind.
    pub kind: MessageKind,
}

impl RelayMessage {
    /// Stable identifier of the message, `<tx_hash>-<log_index>`.
    #[must_use]
    pub fn command_id(&self) -> String {
        format!("{}-{}", self.tx_hash, self.log_index)
    }
}

/// Snapshot of a backend's state after its latest relay pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayData {
    /// Backend that produced the snapshot.
    pub backend: String,
    /// Chain family of that backend.
    pub family: ChainFamily,
    /// Completed passes so far.
    pub passes: u64,
    /// Messages seen so far, keyed by command id.
    pub messages: BTreeMap<String, RelayMessage>,
}

/// A relay pass that failed inside one backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("relayer '{backend}': {message}")]
pub struct RelayError {
    /// Backend name.
    pub backend: String,
    /// Rendered cause.
    pub message: String,
}

impl RelayError {
    /// Creates an error for `backend`.
    pub fn new(backend: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            backend: backend.into(),
            message: cause.to_string(),
        }
    }
}

/// Chain-family-specific relayer backend.
#[async_trait::async_trait]
pub trait Relayer: Send + Sync {
    /// Backend name, used in logs and [`RelayData::backend`].
    fn name(&self) -> &str;

    /// Chain family served.
    fn family(&self) -> ChainFamily;

    /// Makes a provisioned chain known to the backend. Chains outside the
    /// backend's family are ignored.
    fn register_chain(&self, _info: &ChainInfo, _endpoint: &Url) {}

    /// Performs one pass of pending-message discovery and execution.
    async fn relay(&self) -> Result<(), RelayError>;

    /// Snapshot of the latest pass, or `None` before any data exists.
    fn relay_data(&self) -> Option<RelayData>;

    /// Total entries across the backend's event logs.
    fn event_log_len(&self) -> usize;

    /// Clears every event log and forgets registered chains.
    fn reset(&self);
}

/// Shared, ordered collection of relayer backends.
#[derive(Clone, Default)]
pub struct RelayerSet(Arc<[Arc<dyn Relayer>]>);

impl fmt::Debug for RelayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|r| r.name())).finish()
    }
}

impl Deref for RelayerSet {
    type Target = [Arc<dyn Relayer>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Arc<dyn Relayer>> for RelayerSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Relayer>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl RelayerSet {
    /// Runs one pass on every backend, in order. A failing backend does not
    /// prevent the others from running; all failures are returned.
    pub async fn relay_all(&self) -> Vec<RelayError> {
        let mut failures = Vec::new();
        for relayer in self.iter() {
            if let Err(err) = relayer.relay().await {
                failures.push(err);
            }
        }
        failures
    }

    /// Forwards a provisioned chain to every backend.
    pub fn register_chain(&self, info: &ChainInfo, endpoint: &Url) {
        for relayer in self.iter() {
            relayer.register_chain(info, endpoint);
        }
    }

    /// Resets every backend.
    pub fn reset_all(&self) {
        for relayer in self.iter() {
            relayer.reset();
        }
    }
}
