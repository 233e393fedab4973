//! Non-reentrant relay scheduler.
//!
//! [`RelayScheduler`] ticks every `interval` and, on each tick, starts a relay
//! pass over a [`RelayerSet`] unless the previous pass is still running. A
//! tick arriving while a pass is in flight is dropped, never queued.
//!
//! Backend failures inside a pass are suppressed: the scheduler keeps
//! ticking and reports them as [`SchedulerEvent::PassFailed`]. A failing
//! `after_relay` hook is not suppressed; it stops the scheduler and is
//! reported as [`SchedulerEvent::Halted`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::BoxError;
use crate::relay::{RelayData, RelayError, RelayerSet};

/// Hook invoked with each backend's [`RelayData`] after every pass.
pub type AfterRelay = Arc<dyn Fn(&RelayData) -> Result<(), BoxError> + Send + Sync>;

const EVENT_CAPACITY: usize = 256;

/// Observable outcome of a scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Every backend completed its pass.
    PassCompleted {
        /// Tick that started the pass, counting from 1.
        tick: u64,
    },
    /// At least one backend failed; the failures were suppressed.
    PassFailed {
        /// Tick that started the pass.
        tick: u64,
        /// One entry per failing backend.
        failures: Vec<RelayError>,
    },
    /// The tick arrived while a pass was running and was dropped.
    TickSkipped {
        /// Dropped tick.
        tick: u64,
    },
    /// The `after_relay` hook failed; no further ticks run.
    Halted {
        /// Tick whose pass invoked the failing hook.
        tick: u64,
        /// Rendered hook error.
        reason: String,
    },
}

/// Holds the busy flag for the duration of one pass.
struct PassGuard(Arc<AtomicBool>);

impl PassGuard {
    fn try_acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(busy)))
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
struct Pass {
    relayers: RelayerSet,
    after_relay: Option<AfterRelay>,
    events: broadcast::Sender<SchedulerEvent>,
    token: CancellationToken,
}

impl Pass {
    async fn run(self, tick: u64, _guard: PassGuard) {
        let failures = self.relayers.relay_all().await;
        if failures.is_empty() {
            let _ = self.events.send(SchedulerEvent::PassCompleted { tick });
        } else {
            for failure in &failures {
                tracing::warn!(tick, %failure, "relay pass failed");
            }
            let _ = self.events.send(SchedulerEvent::PassFailed { tick, failures });
        }

        let Some(after_relay) = &self.after_relay else {
            return;
        };
        for relayer in self.relayers.iter() {
            let Some(data) = relayer.relay_data() else {
                continue;
            };
            if let Err(err) = after_relay(&data) {
                tracing::error!(
                    tick,
                    backend = relayer.name(),
                    %err,
                    "after_relay hook failed, halting relay scheduler"
                );
                self.token.cancel();
                let _ = self.events.send(SchedulerEvent::Halted {
                    tick,
                    reason: err.to_string(),
                });
                return;
            }
        }
    }
}

/// Periodic, skip-if-busy driver of relay passes.
pub struct RelayScheduler {
    token: CancellationToken,
    tracker: TaskTracker,
    busy: Arc<AtomicBool>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl fmt::Debug for RelayScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayScheduler")
            .field("busy", &self.is_busy())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl RelayScheduler {
    /// Starts ticking every `interval`; the first tick fires one interval
    /// from now. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(
        relayers: RelayerSet,
        interval: Duration,
        after_relay: Option<AfterRelay>,
    ) -> Self {
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let busy = Arc::new(AtomicBool::new(false));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let pass = Pass {
            relayers,
            after_relay,
            events: events.clone(),
            token: token.clone(),
        };
        let ticker = {
            let token = token.clone();
            let tracker = tracker.clone();
            let busy = Arc::clone(&busy);
            async move {
                let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut tick = 0u64;
                loop {
                    tokio::select! {
                        biased;
                        () = token.cancelled() => break,
                        _ = ticks.tick() => {}
                    }
                    if token.is_cancelled() {
                        break;
                    }
                    tick += 1;
                    let Some(guard) = PassGuard::try_acquire(&busy) else {
                        tracing::debug!(tick, "relay pass still running, tick dropped");
                        let _ = pass.events.send(SchedulerEvent::TickSkipped { tick });
                        continue;
                    };
                    tracker.spawn(pass.clone().run(tick, guard));
                }
                tracing::debug!(ticks = tick, "relay scheduler stopped");
            }
        };
        tracker.spawn(ticker);

        tracing::info!(interval_ms = interval.as_millis(), "relay scheduler started");
        Self {
            token,
            tracker,
            busy,
            events,
        }
    }

    /// Subscribes to tick outcomes from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Whether a relay pass is running right now.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether the scheduler was cancelled or halted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops future ticks. A pass already running is left to finish.
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
        self.tracker.close();
    }

    /// Cancels and waits until the in-flight pass, if any, has finished.
    pub async fn shutdown(&self) {
        self.cancel();
        self.tracker.wait().await;
    }
}
