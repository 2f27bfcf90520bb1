use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::GenerationError;
use crate::models::trip::{WeatherCondition, WeatherInfo};

/// WeatherAPI.com serves at most this many forecast days.
const MAX_FORECAST_DAYS: i64 = 14;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CHANCE_THRESHOLD: f64 = 30.0;

/// Forecast source for the trip destination.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn forecast(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeatherInfo, GenerationError>;
}

/// Client for the WeatherAPI.com forecast endpoint.
pub struct WeatherApiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    forecast: Option<Forecast>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    #[serde(default)]
    forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    date: String,
    day: DaySummary,
}

#[derive(Debug, Deserialize)]
struct DaySummary {
    maxtemp_c: f64,
    mintemp_c: f64,
    avgtemp_c: f64,
    condition: ConditionText,
    #[serde(default)]
    daily_chance_of_rain: f64,
    #[serde(default)]
    daily_chance_of_snow: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionText {
    text: String,
}

#[derive(Debug, Serialize)]
struct DailyForecast<'a> {
    date: &'a str,
    max_temp_c: f64,
    min_temp_c: f64,
    avg_temp_c: f64,
    condition: &'a str,
    chance_of_rain: f64,
    chance_of_snow: f64,
}

impl WeatherApiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    async fn forecast(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<WeatherInfo, GenerationError> {
        let total_days = (end - start).num_days() + 1;
        let days = total_days.clamp(1, MAX_FORECAST_DAYS).to_string();

        let response = self
            .http
            .get(format!("{}/forecast.json", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("days", days.as_str()),
                ("aqi", "no"),
                ("alerts", "no"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let body: ForecastResponse = response.json().await?;
        Ok(parse_forecast(&body, total_days))
    }
}

fn parse_forecast(body: &ForecastResponse, total_days: i64) -> WeatherInfo {
    let days = body
        .forecast
        .as_ref()
        .map(|f| f.forecastday.as_slice())
        .unwrap_or_default();

    if days.is_empty() {
        return default_weather();
    }

    let temps: Vec<f64> = days.iter().map(|d| d.day.avgtemp_c).collect();
    let avg_temp = temps.iter().sum::<f64>() / temps.len() as f64;
    let conditions = determine_conditions(days);
    let recommendation = recommendation(avg_temp, &conditions, total_days, &temps);

    let daily: Vec<DailyForecast<'_>> = days
        .iter()
        .map(|d| DailyForecast {
            date: &d.date,
            max_temp_c: d.day.maxtemp_c,
            min_temp_c: d.day.mintemp_c,
            avg_temp_c: d.day.avgtemp_c,
            condition: &d.day.condition.text,
            chance_of_rain: d.day.daily_chance_of_rain,
            chance_of_snow: d.day.daily_chance_of_snow,
        })
        .collect();
    let (name, country) = body
        .location
        .as_ref()
        .map(|l| (l.name.as_str(), l.country.as_str()))
        .unwrap_or_default();

    WeatherInfo {
        avg_temp: (avg_temp * 10.0).round() / 10.0,
        temp_unit: "C".to_string(),
        conditions,
        recommendation,
        forecast_data: Some(serde_json::json!({
            "location": name,
            "country": country,
            "daily_forecasts": daily,
        })),
    }
}

fn determine_conditions(days: &[ForecastDay]) -> Vec<WeatherCondition> {
    let mut seen = BTreeSet::new();

    for d in days {
        let text = d.day.condition.text.to_lowercase();
        let condition = if d.day.daily_chance_of_snow > CHANCE_THRESHOLD || text.contains("snow") {
            Some(WeatherCondition::Snowy)
        } else if d.day.daily_chance_of_rain > CHANCE_THRESHOLD || text.contains("rain") {
            Some(WeatherCondition::Rainy)
        } else if text.contains("cloud") || text.contains("overcast") {
            Some(WeatherCondition::Cloudy)
        } else if text.contains("sun") || text.contains("clear") {
            Some(WeatherCondition::Sunny)
        } else {
            None
        };
        seen.extend(condition);
    }

    match seen.len() {
        0 => vec![WeatherCondition::Sunny],
        1 | 2 => seen.into_iter().collect(),
        _ => vec![WeatherCondition::Mixed],
    }
}

fn recommendation(
    avg_temp: f64,
    conditions: &[WeatherCondition],
    total_days: i64,
    temps: &[f64],
) -> String {
    let mut notes = Vec::new();

    notes.push(if avg_temp < 10.0 {
        "Pack warm layers and a heavy jacket".to_string()
    } else if avg_temp < 20.0 {
        "Pack layers - it will be cool".to_string()
    } else if avg_temp < 25.0 {
        "Pack light layers for mild weather".to_string()
    } else {
        "Pack light, breathable clothing".to_string()
    });

    if conditions.contains(&WeatherCondition::Rainy)
        || conditions.contains(&WeatherCondition::Mixed)
    {
        notes.push("Don't forget rain gear!".to_string());
    }
    if conditions.contains(&WeatherCondition::Snowy) {
        notes.push("Winter gear essential".to_string());
    }

    let max = temps.iter().copied().fold(f64::MIN, f64::max);
    let min = temps.iter().copied().fold(f64::MAX, f64::min);
    if max - min > 10.0 {
        notes.push("Temperature varies - pack versatile items".to_string());
    }

    if total_days > MAX_FORECAST_DAYS {
        notes.push(format!(
            "Long trip ({} days) - consider laundry options",
            total_days
        ));
    }

    format!("{}.", notes.join(". "))
}

fn default_weather() -> WeatherInfo {
    WeatherInfo {
        avg_temp: 20.0,
        temp_unit: "C".to_string(),
        conditions: vec![WeatherCondition::Sunny],
        recommendation: "Check local weather closer to your trip date.".to_string(),
        forecast_data: None,
    }
}
