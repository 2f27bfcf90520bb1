use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{GenerationError, TravelerFailure};
use crate::models::trip::{PackingListForPerson, Traveler, TripContext};
use crate::services::generator::TravelerListGenerator;

/// How partial failure across travelers is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanOutPolicy {
    /// Keep the successful lists; fail only when every traveler failed.
    #[default]
    AtLeastOneMustSucceed,
    /// Fail the attempt if any traveler failed.
    AllMustSucceed,
}

/// Runs one generation task per traveler and joins all of them.
///
/// Every task is awaited even after failures. Tasks live in a [`JoinSet`], so
/// dropping the future (attempt timeout, shutdown) aborts the ones still running.
pub struct FanOutExecutor {
    generator: Arc<dyn TravelerListGenerator>,
    policy: FanOutPolicy,
    concurrency: usize,
}

impl FanOutExecutor {
    pub fn new(generator: Arc<dyn TravelerListGenerator>, concurrency: usize) -> Self {
        Self {
            generator,
            policy: FanOutPolicy::default(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_policy(mut self, policy: FanOutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Generate lists for `travelers`, returned in traveler order.
    pub async fn run(
        &self,
        travelers: &[Traveler],
        context: Arc<TripContext>,
    ) -> Result<Vec<PackingListForPerson>, GenerationError> {
        if travelers.is_empty() {
            return Err(GenerationError::Validation(
                "trip has no travelers to pack for".to_string(),
            ));
        }

        let start = Instant::now();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (idx, traveler) in travelers.iter().cloned().enumerate() {
            let generator = Arc::clone(&self.generator);
            let context = Arc::clone(&context);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                (idx, generator.generate(&traveler, &context).await)
            });
        }

        let mut outcomes: Vec<Option<Result<PackingListForPerson, GenerationError>>> =
            (0..travelers.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => outcomes[idx] = Some(result),
                Err(e) => tracing::error!(error = %e, "Packing list task did not finish"),
            }
        }

        let mut lists = Vec::with_capacity(travelers.len());
        let mut failures = Vec::new();

        for (traveler, outcome) in travelers.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(GenerationError::Opaque("generation task aborted".to_string()))
            });
            match outcome {
                Ok(list) => {
                    tracing::debug!(
                        traveler = %traveler.name,
                        items = list.items.len(),
                        "Generated packing list"
                    );
                    lists.push(list);
                }
                Err(error) => {
                    tracing::warn!(
                        traveler = %traveler.name,
                        traveler_id = %traveler.id,
                        error = %error,
                        "Failed to generate packing list"
                    );
                    failures.push(TravelerFailure {
                        traveler: traveler.name.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            succeeded = lists.len(),
            failed = failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Packing list fan-out complete"
        );

        if lists.is_empty() {
            return Err(GenerationError::AllTravelersFailed(failures));
        }
        if !failures.is_empty() && self.policy == FanOutPolicy::AllMustSucceed {
            return Err(GenerationError::IncompleteFanOut(failures));
        }
        Ok(lists)
    }
}
