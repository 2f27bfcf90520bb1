use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trip_gen::app_state::AppState;
use trip_gen::config::AppConfig;
use trip_gen::db::{
    self, memory, queries::PgJobStore, trip_queries::PgTripStore, JobStore, TripStore,
};
use trip_gen::routes;
use trip_gen::services::{
    avatar::EmojiAvatarAssigner,
    cleanup::CleanupSweeper,
    fanout::FanOutExecutor,
    generator::WorkersAiListGenerator,
    metrics::PrometheusMetricsSink,
    monitor::HealthReporter,
    scheduler::JobScheduler,
    weather::WeatherApiClient,
    workflow::{GenerationWorkflow, WorkflowDeps},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    let pipeline = config.pipeline();

    tracing::info!("Initializing trip-gen server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    PrometheusMetricsSink::describe();

    // Job and trip persistence
    let (jobs, trips): (Arc<dyn JobStore>, Arc<dyn TripStore>) = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let db_pool = db::init_pool(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&db_pool)
                .await
                .expect("Failed to run database migrations");

            (
                Arc::new(PgJobStore::new(db_pool.clone())),
                Arc::new(PgTripStore::new(db_pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, jobs and trips are kept in memory");
            (
                Arc::new(memory::MemoryJobStore::new()),
                Arc::new(memory::MemoryTripStore::new()),
            )
        }
    };

    tracing::info!(model = %config.cf_text_model, "Initializing Cloudflare Workers AI client");
    let generator = WorkersAiListGenerator::new(
        config.cf_account_id.clone(),
        config.cf_api_token.clone(),
        config.cf_text_model.clone(),
    );
    if config.weather_api_key.is_empty() {
        tracing::warn!("WEATHER_API_KEY not set, trips will be generated without forecasts");
    }
    let weather = WeatherApiClient::new(
        config.weather_api_base_url.clone(),
        config.weather_api_key.clone(),
    );

    let workflow = GenerationWorkflow::new(WorkflowDeps {
        weather: Arc::new(weather),
        fan_out: FanOutExecutor::new(Arc::new(generator), pipeline.fan_out_concurrency),
        trips,
        metrics: Arc::new(PrometheusMetricsSink),
        avatars: Arc::new(EmojiAvatarAssigner),
    });

    let scheduler = JobScheduler::new(Arc::clone(&jobs), Arc::new(workflow), &pipeline);
    let health = HealthReporter::new(
        Arc::clone(&jobs),
        pipeline.generation_timeout,
        pipeline.degraded_processing_threshold,
    )
    .with_orphan_window(pipeline.generation_timeout + pipeline.max_backoff);

    // Background cleanup of aged terminal jobs
    let sweeper_shutdown = CancellationToken::new();
    let sweeper = CleanupSweeper::new(
        Arc::clone(&jobs),
        pipeline.cleanup_interval,
        pipeline.job_max_age,
    );
    let sweeper_task = tokio::spawn(sweeper.run(sweeper_shutdown.clone()));

    // Create shared application state
    let state = AppState::new(jobs, scheduler, health);
    let scheduler = Arc::clone(&state.scheduler);

    let app = routes::router(state)
        .merge(routes::metrics::router(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting trip-gen on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("HTTP server stopped, draining background work");
    sweeper_shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        tracing::error!(error = %e, "Cleanup sweeper task failed");
    }
    scheduler.shutdown().await;

    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
