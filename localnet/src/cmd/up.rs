//! `localnet create` / `localnet fork`: run an environment until interrupted.
//!
//! Loads the configuration, provisions the chains through local `anvil`
//! nodes, then keeps the listener and relay scheduler running until a
//! shutdown signal arrives, at which point the environment is torn down.

use std::sync::Arc;

use dotenvy::dotenv;
use tokio::sync::broadcast;

use localnet::Orchestrator;
use localnet::chain::AnvilProvisioner;
use localnet::config::{EnvironmentOptions, load_config};
use localnet::relay::{EvmRelayer, Relayer, RelayerSet};
use localnet::scheduler::SchedulerEvent;
use localnet::signal::SigDown;
use localnet::telemetry::Telemetry;

use super::UpArgs;

/// How the chains of the environment come to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fresh chains seeded from their names.
    Create,
    /// Local forks of registry or custom chains.
    Fork,
}

/// Execute the `create` or `fork` command.
///
/// # Errors
///
/// Returns an error if configuration loading, signal registration, or any
/// provisioning step fails. A failed run is torn down before returning.
#[allow(clippy::future_not_send)]
pub async fn run(args: &UpArgs, mode: Mode) -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let _telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let options = match &args.config {
        Some(path) => load_config(path)?,
        None => EnvironmentOptions::default(),
    };
    let provisioner = args
        .anvil
        .as_ref()
        .map_or_else(AnvilProvisioner::new, AnvilProvisioner::at);
    let relayers: RelayerSet = [Arc::new(EvmRelayer::new()) as Arc<dyn Relayer>]
        .into_iter()
        .collect();
    let mut orchestrator = Orchestrator::new(Arc::new(provisioner), relayers);

    let sig_down = SigDown::try_new()?;
    let provisioned = match mode {
        Mode::Create => orchestrator.create_and_export(&options).await,
        Mode::Fork => orchestrator.fork_and_export(&options).await,
    };
    if let Err(err) = provisioned {
        orchestrator.teardown().await;
        return Err(err.into());
    }

    if let Some(scheduler) = orchestrator.scheduler() {
        tokio::spawn(log_events(scheduler.subscribe()));
    }
    tracing::info!(
        chains = orchestrator.chains().len(),
        "environment ready, press Ctrl+C to stop"
    );

    sig_down.recv().await;
    orchestrator.teardown().await;
    tracing::info!("environment stopped");
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<SchedulerEvent>) {
    loop {
        match events.recv().await {
            Ok(SchedulerEvent::Halted { tick, reason }) => {
                tracing::error!(tick, %reason, "relaying halted, environment stays up");
            }
            Ok(SchedulerEvent::PassFailed { tick, failures }) => {
                tracing::debug!(tick, failed = failures.len(), "relay pass had failures");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "scheduler events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
