use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;

use crate::db::JobStore;
use crate::error::StoreError;
use crate::models::job::{GenerationJob, JobStats};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub stuck_jobs_count: usize,
    pub orphaned_jobs_count: usize,
    pub processing_jobs_count: i64,
    pub timestamp: DateTime<Utc>,
}

/// Read-only diagnostics over the job store.
///
/// A job is stuck when it has been `processing` for longer than the
/// generation timeout. A job is orphaned when it has sat in `pending` past
/// the orphan window, which only happens when its backoff was interrupted.
/// Both are reported, never recovered here.
pub struct HealthReporter {
    store: Arc<dyn JobStore>,
    stuck_after: Duration,
    orphan_after: Duration,
    degraded_processing: i64,
}

impl HealthReporter {
    pub fn new(store: Arc<dyn JobStore>, stuck_after: Duration, degraded_processing: i64) -> Self {
        Self {
            store,
            stuck_after,
            orphan_after: stuck_after,
            degraded_processing,
        }
    }

    /// Should exceed the longest retry backoff so waiting jobs are not flagged.
    pub fn with_orphan_window(mut self, orphan_after: Duration) -> Self {
        self.orphan_after = orphan_after;
        self
    }

    pub async fn stuck_jobs(&self) -> Result<Vec<GenerationJob>, StoreError> {
        self.store.get_stuck(self.stuck_after).await
    }

    pub async fn orphaned_jobs(&self) -> Result<Vec<GenerationJob>, StoreError> {
        self.store.get_orphaned(self.orphan_after).await
    }

    pub async fn stats(&self) -> Result<JobStats, StoreError> {
        self.store.get_stats(self.stuck_after).await
    }

    /// Degraded when any job is stuck or orphaned, or when `degraded_processing`
    /// or more jobs are processing.
    pub async fn health(&self) -> Result<HealthReport, StoreError> {
        let stuck = self.stuck_jobs().await?;
        let orphaned = self.orphaned_jobs().await?;
        let stats = self.stats().await?;

        let status = if stuck.is_empty()
            && orphaned.is_empty()
            && stats.processing < self.degraded_processing
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        if !stuck.is_empty() {
            let ids: Vec<String> = stuck.iter().map(|j| j.id.to_string()).collect();
            tracing::warn!(
                stuck = stuck.len(),
                job_ids = ?ids,
                "Stuck trip generation jobs detected"
            );
        }
        if !orphaned.is_empty() {
            let ids: Vec<String> = orphaned.iter().map(|j| j.id.to_string()).collect();
            tracing::warn!(
                orphaned = orphaned.len(),
                job_ids = ?ids,
                "Pending trip generation jobs have no running task"
            );
        }

        Ok(HealthReport {
            status,
            stuck_jobs_count: stuck.len(),
            orphaned_jobs_count: orphaned.len(),
            processing_jobs_count: stats.processing,
            timestamp: Utc::now(),
        })
    }
}
