//! Geocode cache repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::GeocodeCacheEntity;
use crate::metrics::QueryTimer;
use domain::models::location::Coordinates;

/// Repository for cached geocoding results.
#[derive(Clone)]
pub struct GeocodeCacheRepository {
    pool: PgPool,
}

impl GeocodeCacheRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cached entry for `query` written after `fresh_after`, if any.
    pub async fn find_fresh(
        &self,
        query: &str,
        fresh_after: DateTime<Utc>,
    ) -> Result<Option<GeocodeCacheEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geocode_cache");
        let result = sqlx::query_as::<_, GeocodeCacheEntity>(
            r#"
            SELECT query, latitude, longitude, created_at
            FROM geocode_cache
            WHERE query = $1 AND created_at > $2
            "#,
        )
        .bind(query)
        .bind(fresh_after)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Stores a lookup result; `None` caches a miss.
    pub async fn upsert(
        &self,
        query: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("upsert_geocode_cache");
        let result = sqlx::query(
            r#"
            INSERT INTO geocode_cache (query, latitude, longitude, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (query) DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(query)
        .bind(coordinates.map(|c| c.latitude))
        .bind(coordinates.map(|c| c.longitude))
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        result.map(|_| ())
    }

    /// Drops entries written before `cutoff`.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("purge_geocode_cache");
        let result = sqlx::query("DELETE FROM geocode_cache WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await;
        timer.observe(&result);
        Ok(result?.rows_affected())
    }
}
