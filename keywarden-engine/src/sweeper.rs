//! Background removal of expired keys.
//!
//! The sweeper is a supervised tokio task that periodically deletes every
//! record already past its expiry. A failed sweep is logged and retried on
//! the next tick; only a shutdown signal (or dropping the handle) ends the
//! loop.

use crate::service::KeyService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Interval applied when the operator does not configure one.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration floor for the interval; operators cannot go below this.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic expiry sweeper.
///
/// The first sweep fires immediately on spawn, then every `interval`.
pub struct Sweeper {
    service: Arc<KeyService>,
    interval: Duration,
}

impl Sweeper {
    /// Creates a sweeper over `service` that fires every `interval`.
    /// The interval is floored at 1ms so the timer is always valid.
    #[must_use]
    pub fn new(service: Arc<KeyService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Starts the sweep loop on the runtime, returning the handle that
    /// stops it.
    #[must_use]
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "expiry sweeper started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.service.sweep_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "swept expired keys"),
                        Err(e) => warn!(error = %e, "sweep failed, retrying next tick"),
                    }
                }
                // Fires on an explicit shutdown and when the handle is dropped.
                _ = shutdown.changed() => break,
            }
        }
        info!("expiry sweeper stopped");
    }
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for the loop to exit. An
    /// in-progress sweep finishes before the loop ends.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
