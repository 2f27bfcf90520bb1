//! Test helper utilities for driving the pipeline in-process
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use trip_gen::config::PipelineConfig;
use trip_gen::db::memory::{MemoryJobStore, MemoryTripStore};
use trip_gen::db::JobStore;
use trip_gen::models::job::GenerationJob;
use trip_gen::services::avatar::EmojiAvatarAssigner;
use trip_gen::services::fanout::FanOutExecutor;
use trip_gen::services::metrics::MetricsSink;
use trip_gen::services::scheduler::JobScheduler;
use trip_gen::services::workflow::{GenerationWorkflow, WorkflowDeps};

use crate::fixtures::{FakeWeather, RecordingMetrics, ScriptedGenerator};

/// A scheduler wired to in-memory stores and scripted collaborators.
pub struct Harness {
    pub jobs: Arc<MemoryJobStore>,
    pub trips: Arc<MemoryTripStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub scheduler: JobScheduler,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator) -> Self {
        Self::build(
            generator,
            FakeWeather::Sunny,
            Arc::new(RecordingMetrics::default()),
            PipelineConfig::default(),
        )
    }

    pub fn build(
        generator: ScriptedGenerator,
        weather: FakeWeather,
        metrics: Arc<dyn MetricsSink>,
        config: PipelineConfig,
    ) -> Self {
        let jobs = Arc::new(MemoryJobStore::new());
        let trips = Arc::new(MemoryTripStore::new());
        let generator = Arc::new(generator);

        let workflow = GenerationWorkflow::new(WorkflowDeps {
            weather: Arc::new(weather),
            fan_out: FanOutExecutor::new(generator.clone(), config.fan_out_concurrency),
            trips: trips.clone(),
            metrics,
            avatars: Arc::new(EmojiAvatarAssigner),
        });
        let scheduler = JobScheduler::new(jobs.clone(), Arc::new(workflow), &config);

        Self {
            jobs,
            trips,
            generator,
            scheduler,
        }
    }

    pub async fn job(&self, id: Uuid) -> GenerationJob {
        self.jobs
            .get(id)
            .await
            .unwrap()
            .expect("job should exist")
    }
}

/// Poll a job until it is completed or failed.
///
/// Meant for tests with a paused clock, where each sleep lets the runtime
/// auto-advance through backoffs and timeouts.
pub async fn poll_job_status(
    store: &dyn JobStore,
    job_id: Uuid,
    within: Duration,
) -> Result<GenerationJob, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + within;

    while Instant::now() < deadline {
        let job = store
            .get(job_id)
            .await?
            .ok_or_else(|| format!("Job {} not found", job_id))?;

        if job.status.is_terminal() {
            return Ok(job);
        }
        sleep(Duration::from_millis(100)).await;
    }

    Err(format!("Job did not finish within {} seconds", within.as_secs()).into())
}

/// Wait for a job with a generous budget covering every retry and timeout.
pub async fn wait_for_job_completion(
    store: &dyn JobStore,
    job_id: Uuid,
) -> Result<GenerationJob, Box<dyn std::error::Error>> {
    poll_job_status(store, job_id, Duration::from_secs(3600)).await
}
