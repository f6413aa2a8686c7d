//! Reservation expiry scheduler.
//!
//! A single background loop that periodically sweeps notified queue entries
//! past their claim deadline. The sweep itself acquires each entry's book
//! lock through the engine, so it can run concurrently with user-triggered
//! operations: whichever side transitions an entry first wins and the other
//! no-ops.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::engine::LendingEngine;

/// Handle to the running expiry sweep loop.
///
/// Aborts the loop on shutdown; there is no in-flight state to lose since
/// each sweep step is its own transaction.
#[derive(Debug)]
pub struct ExpiryScheduler {
    handle: JoinHandle<()>,
}

impl ExpiryScheduler {
    /// Spawns the sweep loop with the engine's configured interval.
    #[must_use]
    #[instrument(skip(engine), fields(interval = ?engine.config().sweep_interval))]
    pub fn spawn(engine: LendingEngine) -> Self {
        let interval = engine.config().sweep_interval;
        info!("starting expiry scheduler");

        let handle = tokio::spawn(run_sweep_loop(engine, interval));
        Self { handle }
    }

    /// Stops the sweep loop.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn run_sweep_loop(engine: LendingEngine, interval: Duration) {
    let mut ticker = time::interval(interval);
    // Slow sweeps should not cause a burst of catch-up ticks afterwards.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match engine.sweep_expired().await {
            Ok(stats) => {
                debug!(
                    examined = stats.examined,
                    expired = stats.expired,
                    "sweep tick"
                );
            }
            // Scan-level failure: keep the loop alive and retry next tick.
            Err(err) => error!(error = %err, "expiry sweep failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::LendingConfig;
    use crate::Database;

    #[tokio::test]
    async fn test_scheduler_spawn_and_shutdown() {
        let db = Database::new_in_memory().await.unwrap();
        let engine = LendingEngine::new(
            db,
            LendingConfig {
                sweep_interval: Duration::from_millis(10),
                ..LendingConfig::default()
            },
        );

        let scheduler = ExpiryScheduler::spawn(engine);
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown();
    }
}
