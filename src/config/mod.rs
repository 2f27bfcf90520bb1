use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Jobs and trips are kept in memory when unset.
    pub database_url: Option<String>,

    /// WeatherAPI.com key used for destination forecasts
    #[serde(default)]
    pub weather_api_key: String,

    /// WeatherAPI.com base URL
    #[serde(default = "default_weather_api_base_url")]
    pub weather_api_base_url: String,

    /// Cloudflare account ID
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    pub cf_api_token: String,

    /// Workers AI text model used for packing lists
    #[serde(default = "default_cf_text_model")]
    pub cf_text_model: String,

    /// Hard wall-clock limit for one generation attempt
    #[serde(default = "default_generation_timeout_seconds")]
    pub generation_timeout_seconds: u64,

    /// Log a warning when an attempt runs longer than this
    #[serde(default = "default_warning_threshold_seconds")]
    pub warning_threshold_seconds: u64,

    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Terminal jobs older than this are deleted by the sweeper
    #[serde(default = "default_job_max_age_hours")]
    pub job_max_age_hours: u64,

    #[serde(default = "default_job_max_retries")]
    pub job_max_retries: i32,

    /// Upper bound on the exponential retry backoff
    #[serde(default = "default_max_backoff_seconds")]
    pub max_backoff_seconds: u64,

    /// Maximum concurrent packing list generations per attempt
    #[serde(default = "default_fan_out_concurrency")]
    pub fan_out_concurrency: usize,

    /// Processing job count at which health reports degraded
    #[serde(default = "default_degraded_processing_threshold")]
    pub degraded_processing_threshold: i64,
}

/// Timing and retry knobs shared by the scheduler, health reporter and sweeper.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub generation_timeout: Duration,
    pub warning_threshold: Duration,
    pub cleanup_interval: Duration,
    pub job_max_age: Duration,
    pub max_retries: i32,
    pub max_backoff: Duration,
    pub fan_out_concurrency: usize,
    pub degraded_processing_threshold: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(default_generation_timeout_seconds()),
            warning_threshold: Duration::from_secs(default_warning_threshold_seconds()),
            cleanup_interval: Duration::from_secs(default_cleanup_interval_seconds()),
            job_max_age: Duration::from_secs(default_job_max_age_hours() * 3600),
            max_retries: default_job_max_retries(),
            max_backoff: Duration::from_secs(default_max_backoff_seconds()),
            fan_out_concurrency: default_fan_out_concurrency(),
            degraded_processing_threshold: default_degraded_processing_threshold(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_weather_api_base_url() -> String {
    "http://api.weatherapi.com/v1".to_string()
}

fn default_cf_text_model() -> String {
    "@cf/meta/llama-3.1-8b-instruct".to_string()
}

fn default_generation_timeout_seconds() -> u64 {
    180
}

fn default_warning_threshold_seconds() -> u64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_job_max_age_hours() -> u64 {
    1
}

fn default_job_max_retries() -> i32 {
    2
}

fn default_max_backoff_seconds() -> u64 {
    60
}

fn default_fan_out_concurrency() -> usize {
    8
}

fn default_degraded_processing_threshold() -> i64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// The generation timeout and cleanup interval are at least one second, and
    /// the slow job warning always fires before the generation timeout.
    /// Out-of-range values are clamped with a warning.
    pub fn pipeline(&self) -> PipelineConfig {
        let generation_timeout = Duration::from_secs(self.generation_timeout_seconds.max(1));
        let mut warning_threshold = Duration::from_secs(self.warning_threshold_seconds);
        if warning_threshold.is_zero() || warning_threshold >= generation_timeout {
            warning_threshold = generation_timeout / 2;
            tracing::warn!(
                warning_threshold_seconds = self.warning_threshold_seconds,
                generation_timeout_seconds = generation_timeout.as_secs(),
                clamped_to_ms = warning_threshold.as_millis() as u64,
                "Warning threshold must be between zero and the generation timeout"
            );
        }
        if self.cleanup_interval_seconds == 0 {
            tracing::warn!("CLEANUP_INTERVAL_SECONDS is 0, using 1 second");
        }

        PipelineConfig {
            generation_timeout,
            warning_threshold,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_seconds.max(1)),
            job_max_age: Duration::from_secs(self.job_max_age_hours.saturating_mul(3600)),
            max_retries: self.job_max_retries.max(0),
            max_backoff: Duration::from_secs(self.max_backoff_seconds),
            fan_out_concurrency: self.fan_out_concurrency.max(1),
            degraded_processing_threshold: self.degraded_processing_threshold,
        }
    }
}
