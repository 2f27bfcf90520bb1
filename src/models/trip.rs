use chrono::{DateTime, NaiveDate, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TravelerKind {
    Adult,
    Child,
    Infant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Traveler as submitted with the trip request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TravelerInput {
    #[garde(length(max = 100))]
    #[serde(default)]
    pub name: String,

    #[garde(range(max = 120))]
    pub age: u32,

    #[garde(skip)]
    #[serde(rename = "type")]
    pub kind: TravelerKind,

    #[garde(skip)]
    #[serde(default)]
    pub gender: Option<Gender>,

    #[garde(length(min = 1, max = 16))]
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Trip request decoded from a job's `trip_data`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TripCreate {
    #[garde(length(min = 1, max = 200))]
    pub destination: String,

    #[garde(skip)]
    pub start_date: NaiveDate,

    #[garde(skip)]
    pub end_date: NaiveDate,

    #[garde(skip)]
    #[serde(default)]
    pub activities: Vec<String>,

    #[garde(skip)]
    #[serde(default)]
    pub transport: Vec<String>,

    #[garde(length(min = 1), dive)]
    pub travelers: Vec<TravelerInput>,
}

impl TripCreate {
    /// Inclusive trip length in days.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Traveler after preparation: fresh id, display name and avatar resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Traveler {
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    #[serde(rename = "type")]
    pub kind: TravelerKind,
    pub avatar: String,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    Rainy,
    Cloudy,
    Snowy,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherInfo {
    pub avg_temp: f64,
    pub temp_unit: String,
    pub conditions: Vec<WeatherCondition>,
    pub recommendation: String,
    pub forecast_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackingItem {
    pub id: Uuid,
    pub person_id: Uuid,
    pub name: String,
    pub emoji: String,
    pub quantity: u32,
    pub category: String,
    pub notes: Option<String>,
    pub is_packed: bool,
    pub is_essential: bool,
    pub visible_to_kid: bool,
}

/// Output of one fan-out task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackingListForPerson {
    pub person_id: Uuid,
    pub person_name: String,
    pub items: Vec<PackingItem>,
    /// Sorted, distinct categories present in `items`.
    pub categories: Vec<String>,
}

/// Shared context handed to every per-traveler generation.
#[derive(Debug, Clone, Serialize)]
pub struct TripContext {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    pub weather: Option<WeatherInfo>,
    pub activities: Vec<String>,
    pub transport: Vec<String>,
    /// First adult; shared items go on their list only.
    pub primary_packer: Option<Uuid>,
}

/// The persisted result of a successful generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub user_id: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub activities: Vec<String>,
    pub transport: Vec<String>,
    pub travelers: Vec<Traveler>,
    pub weather_data: Option<WeatherInfo>,
    pub packing_lists: Vec<PackingListForPerson>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
