use std::sync::Arc;

use crate::db::JobStore;
use crate::services::{monitor::HealthReporter, scheduler::JobScheduler};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub scheduler: Arc<JobScheduler>,
    pub health: Arc<HealthReporter>,
}

impl AppState {
    pub fn new(jobs: Arc<dyn JobStore>, scheduler: JobScheduler, health: HealthReporter) -> Self {
        Self {
            jobs,
            scheduler: Arc::new(scheduler),
            health: Arc::new(health),
        }
    }
}
