use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Status of a trip generation job.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs are never mutated again, only deleted.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Coarse failure category recorded on failed jobs and used by the retry policy.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Validation,
    ApiError,
    Transient,
    Unknown,
}

/// A persisted trip generation job, covering every attempt of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub user_id: String,
    pub status: JobStatus,
    pub trip_data: serde_json::Value,
    pub trip_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(user_id: &str, trip_data: serde_json::Value, max_retries: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            status: JobStatus::Pending,
            trip_data,
            trip_id: None,
            error_message: None,
            error_kind: None,
            retry_count: 0,
            max_retries,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Point-in-time job counts. Computed on demand, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub stuck: i64,
    pub total: i64,
}

impl JobStats {
    pub fn add(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
        self.total += count;
    }
}

/// Job view returned to clients. Retry and backoff timing stay internal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub trip_id: Option<Uuid>,
    pub error: Option<String>,
    pub error_type: Option<ErrorKind>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GenerationJob> for JobStatusResponse {
    fn from(job: GenerationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            trip_id: job.trip_id,
            error: job.error_message,
            error_type: job.error_kind,
            retry_count: job.retry_count,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::Processing.to_string(), "processing");
        assert_eq!(JobStatus::from_str("failed").unwrap(), JobStatus::Failed);
        assert!(JobStatus::from_str("running").is_err());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ApiError).unwrap();
        assert_eq!(json, "\"api_error\"");
        assert_eq!(ErrorKind::ApiError.as_ref(), "api_error");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = GenerationJob::new("user-1", serde_json::json!({}), 2);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(job.trip_id.is_none());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn test_response_uses_camel_case() {
        let job = GenerationJob::new("user-1", serde_json::json!({}), 2);
        let value = serde_json::to_value(JobStatusResponse::from(job)).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["retryCount"], 0);
        assert!(value.get("jobId").is_some());
    }
}
