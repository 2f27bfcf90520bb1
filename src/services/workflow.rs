use chrono::Utc;
use garde::Validate;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::db::TripStore;
use crate::error::GenerationError;
use crate::models::trip::{Traveler, TravelerInput, TravelerKind, Trip, TripContext, TripCreate};
use crate::services::avatar::AvatarAssigner;
use crate::services::fanout::FanOutExecutor;
use crate::services::metrics::{
    GenerationMetadata, GenerationMetric, GenerationOutcome, MetricsSink, StepTimings,
};
use crate::services::weather::WeatherProvider;

/// Names that stand in for "no name given" on child travelers.
const GENERIC_NAMES: [&str; 4] = ["child", "kid", "baby", "toddler"];

/// Collaborators used by the generation workflow. Built once at start-up.
pub struct WorkflowDeps {
    pub weather: Arc<dyn WeatherProvider>,
    pub fan_out: FanOutExecutor,
    pub trips: Arc<dyn TripStore>,
    pub metrics: Arc<dyn MetricsSink>,
    pub avatars: Arc<dyn AvatarAssigner>,
}

/// One attempt of trip generation: weather, traveler prep, fan-out
/// generation, persistence, then metrics.
pub struct GenerationWorkflow {
    deps: WorkflowDeps,
}

#[derive(Default)]
struct RunRecord {
    timings: StepTimings,
    metadata: Option<GenerationMetadata>,
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

impl GenerationWorkflow {
    pub fn new(deps: WorkflowDeps) -> Self {
        Self { deps }
    }

    /// Run every step for `trip_data` and return the persisted trip.
    ///
    /// Weather failures degrade to `weather_data = None`. Any other failure is
    /// returned after a best-effort failure metric. Metrics errors are logged
    /// and never change the result.
    pub async fn run(
        &self,
        user_id: &str,
        trip_data: &serde_json::Value,
    ) -> Result<Trip, GenerationError> {
        let total = Instant::now();
        let mut record = RunRecord::default();

        let result = self.execute(user_id, trip_data, &mut record).await;
        record.timings.total_ms = elapsed_ms(total);

        let metric = match &result {
            Ok(trip) => GenerationMetric {
                user_id: user_id.to_string(),
                status: GenerationOutcome::Success,
                timings_ms: record.timings,
                metadata: record.metadata,
                trip_id: Some(trip.id),
                error_message: None,
            },
            Err(e) => GenerationMetric {
                user_id: user_id.to_string(),
                status: GenerationOutcome::Failed,
                timings_ms: record.timings,
                metadata: record.metadata,
                trip_id: None,
                error_message: Some(e.to_string()),
            },
        };

        if let Err(e) = self.deps.metrics.record(metric).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to record generation metric");
        }

        result
    }

    async fn execute(
        &self,
        user_id: &str,
        trip_data: &serde_json::Value,
        record: &mut RunRecord,
    ) -> Result<Trip, GenerationError> {
        let request = decode_request(trip_data)?;
        record.metadata = Some(GenerationMetadata {
            destination: request.destination.clone(),
            activities: request.activities.clone(),
            transport: request.transport.clone(),
            traveler_count: request.travelers.len(),
            weather_included: false,
        });

        // Step 1: weather, non-fatal
        let step = Instant::now();
        let weather = match self
            .deps
            .weather
            .forecast(&request.destination, request.start_date, request.end_date)
            .await
        {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(
                    destination = %request.destination,
                    error = %e,
                    "Weather fetch failed, continuing without forecast"
                );
                None
            }
        };
        record.timings.weather_fetch_ms = Some(elapsed_ms(step));
        if let Some(metadata) = record.metadata.as_mut() {
            metadata.weather_included = weather.is_some();
        }

        // Step 2: traveler preparation
        let step = Instant::now();
        let travelers: Vec<Traveler> = request
            .travelers
            .iter()
            .map(|t| self.prepare_traveler(t))
            .collect();
        record.timings.traveler_prep_ms = Some(elapsed_ms(step));

        // Step 3: per-traveler generation
        let step = Instant::now();
        let context = Arc::new(TripContext {
            destination: request.destination.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            duration_days: request.duration_days(),
            weather,
            activities: request.activities.clone(),
            transport: request.transport.clone(),
            primary_packer: travelers
                .iter()
                .find(|t| t.kind == TravelerKind::Adult)
                .map(|t| t.id),
        });
        let packing_lists = self.deps.fan_out.run(&travelers, Arc::clone(&context)).await?;
        record.timings.llm_generation_ms = Some(elapsed_ms(step));

        // Step 4: persistence
        let step = Instant::now();
        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            destination: request.destination,
            start_date: request.start_date,
            end_date: request.end_date,
            activities: request.activities,
            transport: request.transport,
            travelers,
            weather_data: context.weather.clone(),
            packing_lists,
            created_at: now,
            updated_at: now,
        };
        self.deps.trips.insert(&trip).await?;
        record.timings.persist_ms = Some(elapsed_ms(step));

        tracing::info!(
            user_id = %user_id,
            trip_id = %trip.id,
            lists = trip.packing_lists.len(),
            travelers = trip.travelers.len(),
            "Trip generated"
        );
        Ok(trip)
    }

    fn prepare_traveler(&self, input: &TravelerInput) -> Traveler {
        let avatar = match &input.avatar {
            Some(avatar) => avatar.clone(),
            None => self.deps.avatars.assign(input.age, input.gender, input.kind),
        };

        Traveler {
            id: Uuid::new_v4(),
            name: display_name(input),
            age: input.age,
            kind: input.kind,
            avatar,
        }
    }
}

fn decode_request(trip_data: &serde_json::Value) -> Result<TripCreate, GenerationError> {
    let request: TripCreate = serde_json::from_value(trip_data.clone())
        .map_err(|e| GenerationError::Validation(format!("invalid trip data: {}", e)))?;

    request
        .validate()
        .map_err(|report| GenerationError::Validation(report.to_string()))?;

    if request.end_date < request.start_date {
        return Err(GenerationError::Validation(format!(
            "end_date {} is before start_date {}",
            request.end_date, request.start_date
        )));
    }
    Ok(request)
}

fn display_name(input: &TravelerInput) -> String {
    let name = input.name.trim();
    if name.is_empty() || GENERIC_NAMES.contains(&name.to_lowercase().as_str()) {
        if input.age < 2 {
            format!("Infant ({})", input.age)
        } else {
            format!("Child ({})", input.age)
        }
    } else {
        name.to_string()
    }
}
