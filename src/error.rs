use uuid::Uuid;

use crate::models::job::{ErrorKind, JobStatus};
use crate::services::classifier;

/// Failure raised by one workflow attempt or one of its collaborators.
///
/// Collaborators return the typed variants directly. `Opaque` carries the
/// text of third-party errors that could not be typed; only those fall back
/// to the substring heuristic in [`classifier::classify`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("API error: {0}")]
    Api(String),

    #[error("Failed to generate any packing lists. Errors: {}", format_failures(.0))]
    AllTravelersFailed(Vec<TravelerFailure>),

    #[error("Failed to generate packing lists for some travelers. Errors: {}", format_failures(.0))]
    IncompleteFanOut(Vec<TravelerFailure>),

    #[error("{0}")]
    Opaque(String),
}

/// One traveler's failed generation inside a fan-out.
#[derive(Debug, Clone)]
pub struct TravelerFailure {
    pub traveler: String,
    pub error: GenerationError,
}

fn format_failures(failures: &[TravelerFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("Failed to generate list for {}: {}", f.traveler, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Validation(_) => ErrorKind::Validation,
            GenerationError::Transient(_) => ErrorKind::Transient,
            GenerationError::Timeout(_) => ErrorKind::Timeout,
            GenerationError::Api(_) => ErrorKind::ApiError,
            GenerationError::AllTravelersFailed(failures)
            | GenerationError::IncompleteFanOut(failures) => aggregate_kind(failures),
            GenerationError::Opaque(message) => classifier::classify(message),
        }
    }
}

// Any retryable failure makes the whole fan-out retryable; otherwise the
// kinds must agree or the aggregate is unknown.
fn aggregate_kind(failures: &[TravelerFailure]) -> ErrorKind {
    let kinds: Vec<ErrorKind> = failures.iter().map(|f| f.error.kind()).collect();

    if kinds
        .iter()
        .any(|k| matches!(k, ErrorKind::Transient | ErrorKind::Timeout))
    {
        return ErrorKind::Transient;
    }

    match kinds.split_first() {
        Some((first, rest)) if rest.iter().all(|k| k == first) => *first,
        _ => ErrorKind::Unknown,
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return GenerationError::Transient(err.to_string());
        }

        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return GenerationError::Api(format!("rate limit exceeded: {}", err));
            }
            if status.is_server_error() {
                return GenerationError::Transient(err.to_string());
            }
            return GenerationError::Api(err.to_string());
        }

        if err.is_decode() {
            return GenerationError::Api(err.to_string());
        }

        GenerationError::Opaque(err.to_string())
    }
}

impl From<StoreError> for GenerationError {
    fn from(err: StoreError) -> Self {
        let transient = matches!(
            err,
            StoreError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        );
        if transient {
            GenerationError::Transient(err.to_string())
        } else {
            GenerationError::Opaque(err.to_string())
        }
    }
}

/// Persistence failure from a job or trip store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} is already {status} and cannot change")]
    Terminal { id: Uuid, status: JobStatus },

    #[error("Job {0} has no retries left")]
    RetryBudgetExhausted(Uuid),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
