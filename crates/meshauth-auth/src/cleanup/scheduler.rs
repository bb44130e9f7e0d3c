//! Periodic cleanup loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

use meshauth_core::config::CleanupConfig;

use super::reconciler::CleanupReconciler;

/// Runs [`CleanupReconciler::sweep`] on a fixed interval until cancelled.
#[derive(Debug)]
pub struct CleanupScheduler {
    reconciler: Arc<CleanupReconciler>,
    interval: Duration,
}

impl CleanupScheduler {
    /// Creates a scheduler from cleanup configuration.
    pub fn new(reconciler: Arc<CleanupReconciler>, config: &CleanupConfig) -> Self {
        Self {
            reconciler,
            interval: Duration::from_secs(config.interval_seconds.max(1)),
        }
    }

    /// Runs until `cancel` turns `true`. Cancellation is observed between
    /// passes; a pass in progress always finishes.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(interval_seconds = self.interval.as_secs(), "Cleanup scheduler started");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reconciler.sweep().await {
                        warn!(error = %e, "Cleanup pass failed, retrying next interval");
                    }
                }
            }
        }

        info!("Cleanup scheduler stopped");
    }
}
