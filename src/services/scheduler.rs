use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::JobStore;
use crate::error::{GenerationError, StoreError};
use crate::models::job::GenerationJob;
use crate::models::trip::Trip;
use crate::services::retry::RetryPolicy;
use crate::services::workflow::GenerationWorkflow;

/// Dispatches trip generation jobs as supervised background tasks.
///
/// Each job gets one task that loops over attempts: mark processing, run the
/// workflow under a hard timeout, then complete, fail, or back off and retry.
/// All job tasks are tracked so [`JobScheduler::shutdown`] can cancel and
/// await them.
pub struct JobScheduler {
    runner: Arc<JobRunner>,
    max_retries: i32,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

struct JobRunner {
    store: Arc<dyn JobStore>,
    workflow: Arc<GenerationWorkflow>,
    policy: RetryPolicy,
    generation_timeout: Duration,
    warning_threshold: Duration,
}

impl JobScheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        workflow: Arc<GenerationWorkflow>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            runner: Arc::new(JobRunner {
                store,
                workflow,
                policy: RetryPolicy::new(config.max_backoff),
                generation_timeout: config.generation_timeout,
                warning_threshold: config.warning_threshold,
            }),
            max_retries: config.max_retries,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a `pending` job and start processing it in the background.
    /// Returns the job as created, before any attempt has run.
    pub async fn enqueue(
        &self,
        user_id: &str,
        trip_data: serde_json::Value,
    ) -> Result<GenerationJob, StoreError> {
        let job = self
            .runner
            .store
            .create(user_id, trip_data, self.max_retries)
            .await?;
        metrics::counter!("trip_generation_jobs_total").increment(1);

        tracing::info!(job_id = %job.id, user_id = %user_id, "Trip generation job enqueued");
        self.dispatch(job.id);
        Ok(job)
    }

    /// Start the attempt loop for an existing job.
    pub fn dispatch(&self, job_id: Uuid) {
        let runner = Arc::clone(&self.runner);
        let shutdown = self.shutdown.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::warn!(job_id = %job_id, "Job interrupted by shutdown");
                }
                _ = runner.run(job_id) => {}
            }
        });
    }

    /// Number of job tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel every in-flight job task and wait for all of them to exit.
    /// A job interrupted mid-attempt stays `processing` and is reported as stuck.
    /// A job interrupted during its backoff stays `pending` and is reported as
    /// orphaned. Neither is recovered.
    pub async fn shutdown(&self) {
        tracing::info!(in_flight = self.tracker.len(), "Stopping job scheduler");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl JobRunner {
    async fn run(&self, job_id: Uuid) {
        if let Err(e) = self.drive(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to update trip generation job");
        }
    }

    async fn drive(&self, job_id: Uuid) -> Result<(), StoreError> {
        loop {
            match self.store.get(job_id).await? {
                Some(job) if !job.status.is_terminal() => {}
                Some(job) => {
                    tracing::debug!(job_id = %job_id, status = %job.status, "Job already finished");
                    return Ok(());
                }
                None => {
                    tracing::warn!(job_id = %job_id, "Job disappeared before processing");
                    return Ok(());
                }
            }

            let job = self.store.mark_processing(job_id).await?;
            tracing::info!(
                job_id = %job_id,
                attempt = job.retry_count + 1,
                max_attempts = job.max_retries + 1,
                "Processing trip generation job"
            );

            let error = match self.attempt(&job).await {
                Ok(trip) => {
                    self.store.mark_completed(job_id, trip.id).await?;
                    metrics::counter!("trip_generation_jobs_completed").increment(1);
                    tracing::info!(
                        job_id = %job_id,
                        trip_id = %trip.id,
                        user_id = %job.user_id,
                        "Job completed successfully"
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            let kind = error.kind();
            if self.policy.should_retry(&job, kind) {
                let retried = self.store.increment_retry(job_id).await?;
                let backoff = self.policy.backoff_delay(retried.retry_count);
                metrics::counter!("trip_generation_jobs_retried").increment(1);
                tracing::warn!(
                    job_id = %job_id,
                    error_kind = %kind,
                    error = %error,
                    retry_count = retried.retry_count,
                    max_retries = retried.max_retries,
                    backoff_secs = backoff.as_secs(),
                    "Job attempt failed, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            self.store
                .mark_failed(job_id, &error.to_string(), kind)
                .await?;
            metrics::counter!("trip_generation_jobs_failed").increment(1);
            tracing::error!(
                job_id = %job_id,
                error_kind = %kind,
                error = %error,
                retry_count = job.retry_count,
                "Job failed"
            );
            return Ok(());
        }
    }

    async fn attempt(&self, job: &GenerationJob) -> Result<Trip, GenerationError> {
        let _warning = SlowJobWarning::start(job.id, self.warning_threshold);

        match tokio::time::timeout(
            self.generation_timeout,
            self.workflow.run(&job.user_id, &job.trip_data),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    job_id = %job.id,
                    timeout_seconds = self.generation_timeout.as_secs(),
                    "Job timed out"
                );
                Err(GenerationError::Timeout(self.generation_timeout.as_secs()))
            }
        }
    }
}

/// Logs once if an attempt outlives `threshold`. Aborted when dropped, so it
/// never outlives the attempt it watches.
struct SlowJobWarning(JoinHandle<()>);

impl SlowJobWarning {
    fn start(job_id: Uuid, threshold: Duration) -> Self {
        Self::on_expiry(threshold, move || {
            metrics::counter!("trip_generation_jobs_slow").increment(1);
            tracing::warn!(
                job_id = %job_id,
                threshold_seconds = threshold.as_secs(),
                "Job is taking longer than expected"
            );
        })
    }

    fn on_expiry<F>(threshold: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(tokio::spawn(async move {
            tokio::time::sleep(threshold).await;
            fire();
        }))
    }
}

impl Drop for SlowJobWarning {
    fn drop(&mut self) {
        self.0.abort();
    }
}
