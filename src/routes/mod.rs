pub mod health;
pub mod jobs;
pub mod metrics;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// API routes for trip generation jobs, without the metrics endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/trip-generation/jobs", post(jobs::create_job))
        .route("/api/v1/trip-generation/jobs/stats", get(jobs::job_stats))
        .route("/api/v1/trip-generation/jobs/health", get(jobs::job_health))
        .route("/api/v1/trip-generation/jobs/{job_id}", get(jobs::get_job))
        .with_state(state)
}
