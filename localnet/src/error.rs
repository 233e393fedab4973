//! Unified error types for environment provisioning.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by caller-supplied hooks and node backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type for the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be resolved, read, or parsed.
    #[error("config: {message}")]
    Config {
        /// Human-readable context.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Creating or forking a chain failed.
    #[error("provision '{chain}': {source}")]
    Provision {
        /// Name of the chain being provisioned.
        chain: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// A native-currency transfer to a test account failed.
    #[error("funding '{account}' on '{chain}': {source}")]
    Funding {
        /// Name of the chain the transfer was submitted to.
        chain: String,
        /// Recipient of the failed transfer.
        account: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// The per-chain post-provision hook returned an error.
    #[error("callback for '{chain}': {source}")]
    Hook {
        /// Name of the chain passed to the hook.
        chain: String,
        /// Error returned by the hook.
        #[source]
        source: BoxError,
    },

    /// Writing the environment metadata file failed.
    #[error("export to '{}': {source}", path.display())]
    Export {
        /// Destination path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// The RPC listener could not be bound or served.
    #[error("listener: {0}")]
    Listener(#[source] std::io::Error),
}

impl Error {
    /// Configuration error with a plain message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Configuration error wrapping an underlying cause.
    pub fn config_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Provisioning error for `chain`.
    pub fn provision(chain: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Provision {
            chain: chain.into(),
            source: source.into(),
        }
    }

    /// Funding error for a transfer to `account` on `chain`.
    pub fn funding(
        chain: impl Into<String>,
        account: impl ToString,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Funding {
            chain: chain.into(),
            account: account.to_string(),
            source: source.into(),
        }
    }
}
