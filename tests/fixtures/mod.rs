//! Trip payloads and scripted collaborators for pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use trip_gen::error::GenerationError;
use trip_gen::models::trip::{
    PackingItem, PackingListForPerson, Traveler, TripContext, WeatherCondition, WeatherInfo,
};
use trip_gen::services::generator::TravelerListGenerator;
use trip_gen::services::metrics::{GenerationMetric, MetricsError, MetricsSink};
use trip_gen::services::weather::WeatherProvider;

/// A family trip with one adult and one child.
pub fn family_trip() -> Value {
    json!({
        "destination": "Lisbon",
        "start_date": "2025-07-01",
        "end_date": "2025-07-05",
        "activities": ["beach", "sightseeing"],
        "transport": ["plane"],
        "travelers": [
            {"name": "Ana", "age": 38, "type": "adult", "gender": "female"},
            {"name": "kid", "age": 6, "type": "child", "gender": "male"}
        ]
    })
}

/// A trip with a single adult, so each attempt makes exactly one generator call.
pub fn solo_trip() -> Value {
    json!({
        "destination": "Oslo",
        "start_date": "2025-01-10",
        "end_date": "2025-01-12",
        "travelers": [{"name": "Erik", "age": 45, "type": "adult"}]
    })
}

/// Fails request decoding: no travelers.
pub fn empty_trip() -> Value {
    json!({
        "destination": "Nowhere",
        "start_date": "2025-01-10",
        "end_date": "2025-01-12",
        "travelers": []
    })
}

/// What the scripted generator does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(GenerationError),
    Hang,
}

/// Plays back `steps` one generator call at a time. Once the script runs
/// out, every call repeats `fallback`.
pub struct ScriptedGenerator {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedGenerator {
    pub fn new(steps: Vec<Step>, fallback: Step) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// When each call started, on the tokio clock.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl TravelerListGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        traveler: &Traveler,
        _context: &TripContext,
    ) -> Result<PackingListForPerson, GenerationError> {
        match self.next_step() {
            Step::Succeed => Ok(packing_list(traveler)),
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
        }
    }
}

fn packing_list(traveler: &Traveler) -> PackingListForPerson {
    PackingListForPerson {
        person_id: traveler.id,
        person_name: traveler.name.clone(),
        items: vec![PackingItem {
            id: Uuid::new_v4(),
            person_id: traveler.id,
            name: "Toothbrush".to_string(),
            emoji: "🪥".to_string(),
            quantity: 1,
            category: "toiletries".to_string(),
            notes: None,
            is_packed: false,
            is_essential: true,
            visible_to_kid: true,
        }],
        categories: vec!["toiletries".to_string()],
    }
}

pub enum FakeWeather {
    Sunny,
    Down,
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn forecast(
        &self,
        _location: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<WeatherInfo, GenerationError> {
        match self {
            FakeWeather::Sunny => Ok(WeatherInfo {
                avg_temp: 27.0,
                temp_unit: "C".to_string(),
                conditions: vec![WeatherCondition::Sunny],
                recommendation: "Pack light clothes and sunscreen.".to_string(),
                forecast_data: None,
            }),
            FakeWeather::Down => Err(GenerationError::Transient(
                "weather service connection refused".to_string(),
            )),
        }
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub recorded: Mutex<Vec<GenerationMetric>>,
}

#[async_trait]
impl MetricsSink for RecordingMetrics {
    async fn record(&self, metric: GenerationMetric) -> Result<(), MetricsError> {
        self.recorded.lock().unwrap().push(metric);
        Ok(())
    }
}

pub struct BrokenMetrics;

#[async_trait]
impl MetricsSink for BrokenMetrics {
    async fn record(&self, _metric: GenerationMetric) -> Result<(), MetricsError> {
        Err(MetricsError::Unavailable("collector offline".to_string()))
    }
}
