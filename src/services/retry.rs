use std::time::Duration;

use crate::models::job::{ErrorKind, GenerationJob};

/// Decides whether a failed attempt runs again and how long to wait first.
///
/// Every failure path goes through the same rule: only `timeout` and
/// `transient` failures are retried, and only while the job has budget left.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_backoff: Duration) -> Self {
        Self { max_backoff }
    }

    pub fn is_retryable(kind: ErrorKind) -> bool {
        matches!(kind, ErrorKind::Timeout | ErrorKind::Transient)
    }

    /// `job` is the record as it stood during the failed attempt.
    pub fn should_retry(&self, job: &GenerationJob, kind: ErrorKind) -> bool {
        if kind == ErrorKind::Validation || job.error_kind == Some(ErrorKind::Validation) {
            return false;
        }
        if job.retry_count >= job.max_retries {
            return false;
        }
        Self::is_retryable(kind)
    }

    /// `2^retry_count` seconds, capped at the configured maximum.
    pub fn backoff_delay(&self, retry_count: i32) -> Duration {
        let exponent = retry_count.clamp(0, 32) as u32;
        let delay = Duration::from_secs(2u64.saturating_pow(exponent));
        delay.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
