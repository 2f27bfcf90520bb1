use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::db::{JobStore, TERMINAL_STATUSES};
use crate::error::StoreError;

/// Periodically deletes terminal jobs older than `max_age`.
pub struct CleanupSweeper {
    store: Arc<dyn JobStore>,
    interval: Duration,
    max_age: Duration,
}

impl CleanupSweeper {
    pub fn new(store: Arc<dyn JobStore>, interval: Duration, max_age: Duration) -> Self {
        Self {
            store,
            interval,
            max_age,
        }
    }

    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        self.store.delete_aged(self.max_age, &TERMINAL_STATUSES).await
    }

    /// Sleep, sweep, repeat until `shutdown` fires. Sweep errors are logged and
    /// the loop carries on; cancellation is a clean exit.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Job cleanup sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval) => {}
            }

            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.sweep_once() => result,
            };

            match result {
                Ok(0) => tracing::debug!("Cleanup found no aged jobs"),
                Ok(deleted) => {
                    metrics::counter!("trip_generation_jobs_cleaned").increment(deleted);
                    tracing::info!(deleted = deleted, "Cleaned up old trip generation jobs");
                }
                Err(e) => tracing::error!(error = %e, "Error in job cleanup sweep"),
            }
        }

        tracing::info!("Job cleanup sweeper stopped");
    }
}
