//! In-process stores for tests and database-less runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{cutoff, JobStore, TripStore};
use crate::error::StoreError;
use crate::models::job::{ErrorKind, GenerationJob, JobStats, JobStatus};
use crate::models::trip::Trip;

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, GenerationJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Apply `update` to a non-terminal job under the write lock.
    async fn mutate<F>(&self, id: Uuid, update: F) -> Result<GenerationJob, StoreError>
    where
        F: FnOnce(&mut GenerationJob) -> Result<(), StoreError>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if job.status.is_terminal() {
            return Err(StoreError::Terminal {
                id,
                status: job.status,
            });
        }
        update(job)?;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    #[cfg(test)]
    pub(crate) async fn rewrite<F>(&self, id: Uuid, edit: F)
    where
        F: FnOnce(&mut GenerationJob),
    {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            edit(job);
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(
        &self,
        user_id: &str,
        trip_data: serde_json::Value,
        max_retries: i32,
    ) -> Result<GenerationJob, StoreError> {
        let job = GenerationJob::new(user_id, trip_data, max_retries);
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn mark_processing(&self, id: Uuid) -> Result<GenerationJob, StoreError> {
        self.mutate(id, |job| {
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    async fn mark_completed(&self, id: Uuid, trip_id: Uuid) -> Result<(), StoreError> {
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.trip_id = Some(trip_id);
            job.error_message = None;
            job.error_kind = None;
            job.completed_at = Some(Utc::now());
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error_message: &str,
        error_kind: ErrorKind,
    ) -> Result<(), StoreError> {
        self.mutate(id, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(error_message.to_string());
            job.error_kind = Some(error_kind);
            job.completed_at = Some(Utc::now());
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn increment_retry(&self, id: Uuid) -> Result<GenerationJob, StoreError> {
        self.mutate(id, |job| {
            if job.retry_count >= job.max_retries {
                return Err(StoreError::RetryBudgetExhausted(id));
            }
            job.status = JobStatus::Pending;
            job.retry_count += 1;
            job.started_at = None;
            job.error_message = None;
            job.error_kind = None;
            Ok(())
        })
        .await
    }

    async fn get_stuck(&self, timeout_window: Duration) -> Result<Vec<GenerationJob>, StoreError> {
        let cutoff = cutoff(timeout_window);
        let mut stuck: Vec<GenerationJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == JobStatus::Processing)
            .filter(|job| job.started_at.is_some_and(|started| started < cutoff))
            .cloned()
            .collect();
        stuck.sort_by_key(|job| job.started_at);
        Ok(stuck)
    }

    async fn get_orphaned(&self, idle_window: Duration) -> Result<Vec<GenerationJob>, StoreError> {
        let cutoff = cutoff(idle_window);
        let mut orphaned: Vec<GenerationJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == JobStatus::Pending && job.updated_at < cutoff)
            .cloned()
            .collect();
        orphaned.sort_by_key(|job| job.updated_at);
        Ok(orphaned)
    }

    async fn get_stats(&self, timeout_window: Duration) -> Result<JobStats, StoreError> {
        let mut stats = JobStats::default();
        for job in self.jobs.read().await.values() {
            stats.add(job.status, 1);
        }
        stats.stuck = self.get_stuck(timeout_window).await?.len() as i64;
        Ok(stats)
    }

    async fn delete_aged(
        &self,
        max_age: Duration,
        statuses: &[JobStatus],
    ) -> Result<u64, StoreError> {
        let cutoff = cutoff(max_age);
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            let eligible = job.status.is_terminal() && statuses.contains(&job.status);
            !(eligible && job.created_at < cutoff)
        });
        Ok((before - jobs.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryTripStore {
    trips: RwLock<HashMap<Uuid, Trip>>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<Trip> {
        self.trips.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.trips.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trips.read().await.is_empty()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn insert(&self, trip: &Trip) -> Result<Uuid, StoreError> {
        self.trips.write().await.insert(trip.id, trip.clone());
        Ok(trip.id)
    }
}
