//! PostgreSQL store tests.
//!
//! These need a disposable database: the job test clears the jobs table.
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres_test -- --ignored

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use trip_gen::db::{
    self, queries::PgJobStore, trip_queries::PgTripStore, JobStore, TripStore, TERMINAL_STATUSES,
};
use trip_gen::error::StoreError;
use trip_gen::models::job::{ErrorKind, JobStatus};
use trip_gen::models::trip::Trip;

const WINDOW: Duration = Duration::from_secs(180);

async fn connect() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn backdate(pool: &PgPool, id: Uuid, column: &str, minutes: i64) {
    sqlx::query(&format!(
        "UPDATE trip_generation_jobs SET {column} = NOW() - make_interval(mins => $2) WHERE id = $1"
    ))
    .bind(id)
    .bind(minutes as i32)
    .execute(pool)
    .await
    .expect("Failed to backdate job");
}

#[tokio::test]
#[ignore] // Run with: cargo test --test postgres_test -- --ignored
async fn test_pg_job_store() {
    let pool = connect().await;
    sqlx::query("DELETE FROM trip_generation_jobs")
        .execute(&pool)
        .await
        .expect("Failed to clear jobs");
    let store = PgJobStore::new(pool.clone());

    // Lifecycle with a single retry
    let job = store.create("user-1", serde_json::json!({"a": 1}), 1).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 0);

    let processing = store.mark_processing(job.id).await.unwrap();
    assert_eq!(processing.status, JobStatus::Processing);
    assert!(processing.started_at.is_some());

    let retried = store.increment_retry(job.id).await.unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.started_at.is_none());

    store.mark_processing(job.id).await.unwrap();
    let exhausted = store.increment_retry(job.id).await;
    assert!(matches!(exhausted, Err(StoreError::RetryBudgetExhausted(id)) if id == job.id));
    assert_eq!(store.get(job.id).await.unwrap().unwrap().retry_count, 1);

    // Terminal jobs reject every mutation
    let trip_id = Uuid::new_v4();
    store.mark_completed(job.id, trip_id).await.unwrap();
    let completed = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.trip_id, Some(trip_id));
    assert!(completed.completed_at.is_some());

    for result in [
        store.mark_processing(job.id).await.map(|_| ()),
        store.mark_failed(job.id, "late failure", ErrorKind::Unknown).await,
        store.increment_retry(job.id).await.map(|_| ()),
    ] {
        assert!(matches!(
            result,
            Err(StoreError::Terminal { status: JobStatus::Completed, .. })
        ));
    }
    assert!(matches!(
        store.mark_processing(Uuid::new_v4()).await,
        Err(StoreError::NotFound(_))
    ));

    // Two pending, one stuck processing, one completed, one failed
    let failed = store.create("user-1", serde_json::json!({}), 2).await.unwrap();
    store.mark_processing(failed.id).await.unwrap();
    store
        .mark_failed(failed.id, "bad input", ErrorKind::Validation)
        .await
        .unwrap();
    let failed = store.get(failed.id).await.unwrap().unwrap();
    assert_eq!(failed.error_kind, Some(ErrorKind::Validation));
    assert_eq!(failed.error_message.as_deref(), Some("bad input"));

    let stuck = store.create("user-2", serde_json::json!({}), 2).await.unwrap();
    store.mark_processing(stuck.id).await.unwrap();
    backdate(&pool, stuck.id, "started_at", 10).await;

    let fresh = store.create("user-2", serde_json::json!({}), 2).await.unwrap();
    let idle = store.create("user-2", serde_json::json!({}), 2).await.unwrap();
    backdate(&pool, idle.id, "updated_at", 10).await;

    let stuck_jobs = store.get_stuck(WINDOW).await.unwrap();
    let ids: Vec<Uuid> = stuck_jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![stuck.id]);

    let orphaned = store.get_orphaned(WINDOW).await.unwrap();
    let ids: Vec<Uuid> = orphaned.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![idle.id]);

    let stats = store.get_stats(WINDOW).await.unwrap();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.processing, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.stuck, 1);
    assert_eq!(stats.total, 5);

    // Age every job past the cutoff; only terminal ones are swept
    for id in [job.id, failed.id, stuck.id, fresh.id, idle.id] {
        backdate(&pool, id, "created_at", 120).await;
    }
    let all = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];
    let deleted = store.delete_aged(Duration::from_secs(3600), &all).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(store.get(job.id).await.unwrap().is_none());
    assert!(store.get(failed.id).await.unwrap().is_none());
    for id in [stuck.id, fresh.id, idle.id] {
        assert!(store.get(id).await.unwrap().is_some());
    }

    let deleted = store
        .delete_aged(Duration::from_secs(3600), &TERMINAL_STATUSES)
        .await
        .unwrap();
    assert_eq!(deleted, 0);
}

#[tokio::test]
#[ignore] // Run with: cargo test --test postgres_test -- --ignored
async fn test_pg_trip_store_insert() {
    let pool = connect().await;
    let store = PgTripStore::new(pool.clone());

    let now = Utc::now();
    let trip = Trip {
        id: Uuid::new_v4(),
        user_id: "user-1".to_string(),
        destination: "Lisbon".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 7, 5).unwrap(),
        activities: vec!["beach".to_string()],
        transport: Vec::new(),
        travelers: Vec::new(),
        weather_data: None,
        packing_lists: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let id = store.insert(&trip).await.unwrap();
    assert_eq!(id, trip.id);

    let (destination, document): (String, serde_json::Value) =
        sqlx::query_as("SELECT destination, document FROM trips WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(destination, "Lisbon");
    assert_eq!(document["activities"][0], "beach");

    assert!(store.insert(&trip).await.is_err());

    sqlx::query("DELETE FROM trips WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
}
