//! Reload Coordinator
//!
//! Single-flight guard around `CacheEngine::reload`.
//!
//! ```text
//! idle ──trigger──▶ in_flight ──reload done (any outcome)──▶ idle
//!                       │
//!                  trigger ─▶ Skipped (caller reads the current views)
//! ```
//!
//! Triggers coalesce instead of queueing. The reload itself runs on its
//! own task, so a caller that gives up (request timeout) does not cancel
//! it and the views are still published when it finishes.

use crate::cache::engine::{CacheEngine, ReloadOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Ensures at most one reload runs against the store at a time
pub struct ReloadCoordinator {
    engine: Arc<CacheEngine>,
    in_flight: Arc<AtomicBool>,
}

/// Holds the in-flight flag; clears it on drop, even if the reload panics
struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ReloadCoordinator {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self {
            engine,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a reload is running right now
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a reload unless one is already running.
    ///
    /// Returns `Skipped` immediately when another reload holds the flag;
    /// otherwise waits for this reload's outcome.
    pub async fn trigger(&self) -> ReloadOutcome {
        let Some(guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Reload already in flight, serving current views");
            return ReloadOutcome::Skipped;
        };

        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move {
            let _guard = guard;
            engine.reload().await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Reload task aborted");
                ReloadOutcome::Failed(e.to_string())
            }
        }
    }

    /// Spawn the periodic reload timer.
    ///
    /// The first tick fires immediately, which performs the initial load.
    pub fn start_periodic(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tracing::info!(interval_secs = every.as_secs(), "Starting periodic reload");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                match self.trigger().await {
                    ReloadOutcome::Reloaded { rows, latest } => {
                        tracing::debug!(rows, latest, "Periodic reload finished");
                    }
                    ReloadOutcome::Skipped => {
                        tracing::debug!("Periodic reload coalesced with a running one");
                    }
                    ReloadOutcome::Unavailable => {
                        tracing::warn!("Periodic reload: store unavailable");
                    }
                    ReloadOutcome::Failed(error) => {
                        tracing::warn!(%error, "Periodic reload failed");
                    }
                }
            }
        })
    }
}
