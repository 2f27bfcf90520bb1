use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::{cutoff, JobStore};
use crate::error::StoreError;
use crate::models::job::{ErrorKind, GenerationJob, JobStats, JobStatus};

const JOB_COLUMNS: &str = "id, user_id, status, trip_data, trip_id, error_message, error_kind, \
     retry_count, max_retries, started_at, completed_at, created_at, updated_at";

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Explain why a guarded UPDATE matched no row.
    async fn rejection(&self, id: Uuid) -> StoreError {
        match self.get(id).await {
            Ok(Some(job)) if job.status.is_terminal() => StoreError::Terminal {
                id,
                status: job.status,
            },
            Ok(Some(_)) => StoreError::RetryBudgetExhausted(id),
            Ok(None) => StoreError::NotFound(id),
            Err(e) => e,
        }
    }
}

fn job_from_row(r: &PgRow) -> Result<GenerationJob, StoreError> {
    let status_str: String = r.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|_| StoreError::Corrupt(format!("unknown job status '{}'", status_str)))?;

    let error_kind = r
        .try_get::<Option<String>, _>("error_kind")?
        .map(|kind| {
            ErrorKind::from_str(&kind)
                .map_err(|_| StoreError::Corrupt(format!("unknown error kind '{}'", kind)))
        })
        .transpose()?;

    Ok(GenerationJob {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        status,
        trip_data: r.try_get("trip_data")?,
        trip_id: r.try_get("trip_id")?,
        error_message: r.try_get("error_message")?,
        error_kind,
        retry_count: r.try_get("retry_count")?,
        max_retries: r.try_get("max_retries")?,
        started_at: r.try_get("started_at")?,
        completed_at: r.try_get("completed_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(
        &self,
        user_id: &str,
        trip_data: serde_json::Value,
        max_retries: i32,
    ) -> Result<GenerationJob, StoreError> {
        let job = GenerationJob::new(user_id, trip_data, max_retries);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO trip_generation_jobs
                (id, user_id, status, trip_data, retry_count, max_retries, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, 0, $4, $5, $5)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id)
        .bind(&job.user_id)
        .bind(&job.trip_data)
        .bind(job.max_retries)
        .bind(job.created_at)
        .fetch_one(&self.pool)
        .await?;

        job_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM trip_generation_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn mark_processing(&self, id: Uuid) -> Result<GenerationJob, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE trip_generation_jobs
            SET status = 'processing',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => job_from_row(&r),
            None => Err(self.rejection(id).await),
        }
    }

    async fn mark_completed(&self, id: Uuid, trip_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trip_generation_jobs
            SET status = 'completed',
                trip_id = $2,
                error_message = NULL,
                error_kind = NULL,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .bind(trip_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.rejection(id).await);
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: &str,
        error_kind: ErrorKind,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trip_generation_jobs
            SET status = 'failed',
                error_message = $2,
                error_kind = $3,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(error_kind.as_ref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.rejection(id).await);
        }
        Ok(())
    }

    async fn increment_retry(&self, id: Uuid) -> Result<GenerationJob, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE trip_generation_jobs
            SET status = 'pending',
                retry_count = retry_count + 1,
                started_at = NULL,
                error_message = NULL,
                error_kind = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('pending', 'processing')
              AND retry_count < max_retries
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => job_from_row(&r),
            None => Err(self.rejection(id).await),
        }
    }

    async fn get_stuck(&self, timeout_window: Duration) -> Result<Vec<GenerationJob>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM trip_generation_jobs
            WHERE status = 'processing' AND started_at < $1
            ORDER BY started_at ASC
            "#
        ))
        .bind(cutoff(timeout_window))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn get_orphaned(
        &self,
        idle_window: Duration,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM trip_generation_jobs
            WHERE status = 'pending' AND updated_at < $1
            ORDER BY updated_at ASC
            "#
        ))
        .bind(cutoff(idle_window))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn get_stats(&self, timeout_window: Duration) -> Result<JobStats, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM trip_generation_jobs
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = JobStats::default();
        for r in rows {
            let status_str: String = r.try_get("status")?;
            let status = JobStatus::from_str(&status_str)
                .map_err(|_| StoreError::Corrupt(format!("unknown job status '{}'", status_str)))?;
            stats.add(status, r.try_get("count")?);
        }

        let stuck = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM trip_generation_jobs
            WHERE status = 'processing' AND started_at < $1
            "#,
        )
        .bind(cutoff(timeout_window))
        .fetch_one(&self.pool)
        .await?;
        stats.stuck = stuck.try_get("count")?;

        Ok(stats)
    }

    async fn delete_aged(
        &self,
        max_age: Duration,
        statuses: &[JobStatus],
    ) -> Result<u64, StoreError> {
        // Only terminal statuses are ever eligible, whatever the caller passes.
        let statuses: Vec<String> = statuses
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.to_string())
            .collect();

        let result = sqlx::query(
            r#"
            DELETE FROM trip_generation_jobs
            WHERE created_at < $1 AND status = ANY($2)
            "#,
        )
        .bind(cutoff(max_age))
        .bind(statuses)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
