//! Writing provisioned chain metadata to disk.

use std::path::Path;

use crate::chain::ChainInfo;
use crate::error::{Error, Result};

/// Serialises `chains` as a JSON array to `path`, replacing any previous
/// content.
///
/// # Errors
///
/// Returns [`Error::Export`] if serialisation or the write fails.
pub async fn export_chains(chains: &[ChainInfo], path: &Path) -> Result<()> {
    let export_err = |source: Box<dyn std::error::Error + Send + Sync>| Error::Export {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(chains).map_err(|e| export_err(e.into()))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| export_err(e.into()))?;

    tracing::info!(path = %path.display(), chains = chains.len(), "environment exported");
    Ok(())
}
