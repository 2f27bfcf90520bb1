use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{JobStats, JobStatusResponse};
use crate::services::monitor::{HealthReport, HealthStatus};

const USER_HEADER: &str = "x-user-id";

fn user_id(headers: &HeaderMap) -> Result<String, StatusCode> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// POST /api/v1/trip-generation/jobs: Queue a trip for background generation.
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(trip_data): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<JobStatusResponse>), StatusCode> {
    let user_id = user_id(&headers)?;
    if !trip_data.is_object() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let job = state
        .scheduler
        .enqueue(&user_id, trip_data)
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = %user_id,
                error = %e,
                "Failed to enqueue trip generation job"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

/// GET /api/v1/trip-generation/jobs/{job_id}: Poll a job owned by the caller.
pub async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let user_id = user_id(&headers)?;

    let job = state.jobs.get(job_id).await.map_err(|e| {
        tracing::error!(job_id = %job_id, error = %e, "Failed to load trip generation job");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match job {
        Some(job) if job.user_id == user_id => Ok(Json(job.into())),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/v1/trip-generation/jobs/stats
pub async fn job_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<JobStats>, StatusCode> {
    user_id(&headers)?;
    state.health.stats().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to compute job stats");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /api/v1/trip-generation/jobs/health
pub async fn job_health(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<HealthReport>), StatusCode> {
    user_id(&headers)?;
    let report = state.health.health().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to compute job health");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let status_code = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status_code, Json(report)))
}
