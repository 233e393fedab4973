//! Shutdown signal handling for the long-running CLI commands.
//!
//! [`SigDown`] turns the first SIGTERM/SIGINT (Ctrl+C on Windows) into a
//! cancelled [`CancellationToken`], after which the environment is torn down.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first shutdown signal.
#[allow(missing_debug_implementations)]
pub struct SigDown {
    watcher: TaskTracker,
    token: CancellationToken,
}

impl SigDown {
    /// Registers the signal handlers and starts watching.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if a handler cannot be registered.
    #[allow(clippy::unnecessary_wraps)]
    pub fn try_new() -> Result<Self, std::io::Error> {
        let token = CancellationToken::new();
        let watcher = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            let token = token.clone();
            watcher.spawn(async move {
                let name = tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    _ = sigint.recv() => "SIGINT",
                };
                tracing::info!(signal = name, "shutdown requested");
                token.cancel();
            });
        }

        #[cfg(windows)]
        {
            let token = token.clone();
            watcher.spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!(signal = "Ctrl+C", "shutdown requested");
                token.cancel();
            });
        }

        watcher.close();
        Ok(Self { watcher, token })
    }

    /// Resolves after a shutdown signal has been handled.
    pub async fn recv(&self) {
        self.token.cancelled().await;
        self.watcher.wait().await;
    }
}
