use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::TripStore;
use crate::error::StoreError;
use crate::models::trip::Trip;

/// PostgreSQL-backed trip store. The full aggregate is kept as a JSONB document.
#[derive(Clone)]
pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn insert(&self, trip: &Trip) -> Result<Uuid, StoreError> {
        let document = serde_json::to_value(trip)?;

        sqlx::query(
            r#"
            INSERT INTO trips
                (id, user_id, destination, start_date, end_date, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(trip.id)
        .bind(&trip.user_id)
        .bind(&trip.destination)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(document)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(trip.id)
    }
}
