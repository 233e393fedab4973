//! Ephemeral multi-chain local environments.
//!
//! `localnet` spins up a set of local EVM chains, either fresh or forked from
//! real networks, funds test accounts on each, writes the resulting chain
//! metadata to disk, and keeps a relay scheduler polling cross-chain
//! messages between them until the environment is torn down.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use localnet::chain::AnvilProvisioner;
//! use localnet::relay::{EvmRelayer, Relayer};
//! use localnet::{EnvironmentOptions, Orchestrator};
//!
//! # async fn demo() -> localnet::Result<()> {
//! let relayers = [Arc::new(EvmRelayer::new()) as Arc<dyn Relayer>]
//!     .into_iter()
//!     .collect();
//! let mut env = Orchestrator::new(Arc::new(AnvilProvisioner::new()), relayers);
//! env.create_and_export(&EnvironmentOptions::default()).await?;
//! // ... interact with http://localhost:8500/0 ...
//! env.teardown().await;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod environment;
pub mod error;
pub mod export;
pub mod funder;
pub mod listener;
pub mod relay;
pub mod scheduler;
pub mod signal;
pub mod telemetry;
pub mod token;

#[cfg(test)]
mod testing;

pub use config::{ChainHook, EnvironmentOptions, Hooks};
pub use environment::Orchestrator;
pub use error::{BoxError, Error, Result};
pub use scheduler::{AfterRelay, RelayScheduler, SchedulerEvent};
pub use token::{CanonicalToken, TokenRegistry};
