use async_trait::async_trait;
use serde::Serialize;
use strum::{AsRefStr, Display};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationOutcome {
    Success,
    Failed,
}

/// Per-step wall-clock timings of one workflow run, in milliseconds.
/// Steps that never ran stay `None`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StepTimings {
    pub weather_fetch_ms: Option<u64>,
    pub traveler_prep_ms: Option<u64>,
    pub llm_generation_ms: Option<u64>,
    pub persist_ms: Option<u64>,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationMetadata {
    pub destination: String,
    pub activities: Vec<String>,
    pub transport: Vec<String>,
    pub traveler_count: usize,
    pub weather_included: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetric {
    pub user_id: String,
    pub status: GenerationOutcome,
    pub timings_ms: StepTimings,
    pub metadata: Option<GenerationMetadata>,
    pub trip_id: Option<Uuid>,
    pub error_message: Option<String>,
}

/// Best-effort sink for workflow metrics. Callers swallow its errors.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&self, metric: GenerationMetric) -> Result<(), MetricsError>;
}

/// Emits workflow metrics through the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetricsSink;

impl PrometheusMetricsSink {
    /// Register metric descriptions with the installed recorder.
    pub fn describe() {
        metrics::describe_counter!(
            "trip_generation_total",
            "Trip generation workflow runs by outcome"
        );
        metrics::describe_histogram!(
            "trip_generation_step_seconds",
            "Duration of each trip generation step"
        );
        metrics::describe_histogram!(
            "trip_generation_seconds",
            "Total duration of a trip generation workflow run"
        );
        metrics::describe_counter!(
            "trip_generation_jobs_total",
            "Total trip generation jobs enqueued"
        );
        metrics::describe_counter!(
            "trip_generation_jobs_completed",
            "Total trip generation jobs completed"
        );
        metrics::describe_counter!(
            "trip_generation_jobs_failed",
            "Total trip generation jobs that failed"
        );
        metrics::describe_counter!(
            "trip_generation_jobs_retried",
            "Total trip generation attempts requeued for retry"
        );
        metrics::describe_counter!(
            "trip_generation_jobs_slow",
            "Total attempts that outlived the slow job warning threshold"
        );
        metrics::describe_counter!(
            "trip_generation_jobs_cleaned",
            "Total terminal jobs removed by cleanup"
        );
    }
}

#[async_trait]
impl MetricsSink for PrometheusMetricsSink {
    async fn record(&self, metric: GenerationMetric) -> Result<(), MetricsError> {
        let t = &metric.timings_ms;
        let steps = [
            ("weather_fetch", t.weather_fetch_ms),
            ("traveler_prep", t.traveler_prep_ms),
            ("llm_generation", t.llm_generation_ms),
            ("persist", t.persist_ms),
        ];
        for (step, ms) in steps {
            if let Some(ms) = ms {
                metrics::histogram!("trip_generation_step_seconds", "step" => step)
                    .record(ms as f64 / 1000.0);
            }
        }

        metrics::histogram!("trip_generation_seconds").record(t.total_ms as f64 / 1000.0);
        metrics::counter!("trip_generation_total", "status" => metric.status.as_ref().to_string())
            .increment(1);

        tracing::debug!(
            user_id = %metric.user_id,
            status = %metric.status,
            total_ms = t.total_ms,
            trip_id = ?metric.trip_id,
            "Recorded trip generation metric"
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Metrics sink unavailable: {0}")]
    Unavailable(String),
}
