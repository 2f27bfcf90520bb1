use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::job::{ErrorKind, GenerationJob, JobStats, JobStatus};
use crate::models::trip::Trip;

pub mod memory;
pub mod queries;
pub mod trip_queries;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Persistence for trip generation jobs.
///
/// Every mutation is a single atomic record update that stamps `updated_at`.
/// Terminal jobs (`completed`, `failed`) reject further mutation. There is no
/// guard against two executors driving the same job id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job with `retry_count = 0`.
    async fn create(
        &self,
        user_id: &str,
        trip_data: serde_json::Value,
        max_retries: i32,
    ) -> Result<GenerationJob, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>, StoreError>;

    /// `status = processing`, `started_at = now`.
    async fn mark_processing(&self, id: Uuid) -> Result<GenerationJob, StoreError>;

    /// `status = completed`, `trip_id` set, `completed_at = now`.
    async fn mark_completed(&self, id: Uuid, trip_id: Uuid) -> Result<(), StoreError>;

    /// `status = failed` with error context, `completed_at = now`.
    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: &str,
        error_kind: ErrorKind,
    ) -> Result<(), StoreError>;

    /// Back to `pending` with `retry_count + 1`, `started_at` and error fields cleared.
    async fn increment_retry(&self, id: Uuid) -> Result<GenerationJob, StoreError>;

    /// Jobs in `processing` whose `started_at` is older than `now - timeout_window`.
    async fn get_stuck(&self, timeout_window: Duration) -> Result<Vec<GenerationJob>, StoreError>;

    /// Jobs in `pending` whose `updated_at` is older than `now - idle_window`.
    /// A job waits in `pending` through its retry backoff, so a process that
    /// stops mid-backoff leaves it here with no task driving it.
    async fn get_orphaned(&self, idle_window: Duration) -> Result<Vec<GenerationJob>, StoreError>;

    async fn get_stats(&self, timeout_window: Duration) -> Result<JobStats, StoreError>;

    /// Delete jobs with a status in `statuses` created before `now - max_age`.
    async fn delete_aged(
        &self,
        max_age: Duration,
        statuses: &[JobStatus],
    ) -> Result<u64, StoreError>;
}

/// Persistence for generated trips.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn insert(&self, trip: &Trip) -> Result<Uuid, StoreError>;
}

/// Terminal statuses swept by age-based cleanup.
pub const TERMINAL_STATUSES: [JobStatus; 2] = [JobStatus::Completed, JobStatus::Failed];

/// `now - window`, saturating at the earliest representable instant.
pub(crate) fn cutoff(window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
