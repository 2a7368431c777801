//! Location history repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::{
    DeviceStatsEntity, LocationEntity, LocationFrequencyEntity, LocationWithDeviceEntity,
};
use crate::metrics::QueryTimer;
use domain::errors::StorageError;
use domain::models::location::{LocationReading, NewLocationReading};
use domain::services::ReadingStore;

/// Repository for location-history database operations.
#[derive(Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    /// Creates a new LocationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert(&self, reading: &NewLocationReading) -> Result<LocationEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_reading");
        let result = sqlx::query_as::<_, LocationEntity>(
            r#"
            INSERT INTO location_history
                (device_id, timestamp, location_text_raw, location_text_clean,
                 latitude, longitude, distance_meters)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, device_id, timestamp, location_text_raw, location_text_clean,
                      latitude, longitude, distance_meters
            "#,
        )
        .bind(reading.device_id)
        .bind(reading.timestamp)
        .bind(reading.location_text_raw.as_deref())
        .bind(&reading.location_text_clean)
        .bind(reading.coordinates.map(|c| c.latitude))
        .bind(reading.coordinates.map(|c| c.longitude))
        .bind(reading.distance_meters)
        .fetch_one(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Readings of one device, newest first.
    pub async fn find_by_device(
        &self,
        device_id: i64,
        limit: i64,
    ) -> Result<Vec<LocationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_readings_by_device");
        let result = sqlx::query_as::<_, LocationEntity>(
            r#"
            SELECT id, device_id, timestamp, location_text_raw, location_text_clean,
                   latitude, longitude, distance_meters
            FROM location_history
            WHERE device_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Most recent readings across all devices.
    pub async fn find_recent(
        &self,
        limit: i64,
    ) -> Result<Vec<LocationWithDeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_recent_readings");
        let result = sqlx::query_as::<_, LocationWithDeviceEntity>(
            r#"
            SELECT l.id, l.device_id, l.timestamp, l.location_text_raw, l.location_text_clean,
                   l.latitude, l.longitude, l.distance_meters,
                   d.canonical_name AS device_name
            FROM location_history l
            JOIN devices d ON d.id = l.device_id
            ORDER BY l.timestamp DESC, l.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Readings whose clean text contains `text`, case-insensitively.
    pub async fn search(
        &self,
        text: &str,
        device_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<LocationWithDeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("search_readings");
        let result = sqlx::query_as::<_, LocationWithDeviceEntity>(
            r#"
            SELECT l.id, l.device_id, l.timestamp, l.location_text_raw, l.location_text_clean,
                   l.latitude, l.longitude, l.distance_meters,
                   d.canonical_name AS device_name
            FROM location_history l
            JOIN devices d ON d.id = l.device_id
            WHERE l.location_text_clean ILIKE '%' || $1 || '%' ESCAPE '\'
              AND ($2::TEXT IS NULL OR LOWER(d.canonical_name) = LOWER($2))
            ORDER BY l.timestamp DESC, l.id DESC
            LIMIT $3
            "#,
        )
        .bind(escape_like(text))
        .bind(device_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Deletes one reading. Returns whether it existed.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_reading");
        let result = sqlx::query("DELETE FROM location_history WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.observe(&result);
        Ok(result?.rows_affected() > 0)
    }

    /// Deletes readings older than `cutoff` in batches to avoid long locks.
    pub async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: i64,
    ) -> Result<u64, sqlx::Error> {
        let mut total_deleted: u64 = 0;

        loop {
            let timer = QueryTimer::new("delete_old_readings");
            let result = sqlx::query(
                r#"
                WITH to_delete AS (
                    SELECT id FROM location_history
                    WHERE timestamp < $1
                    LIMIT $2
                )
                DELETE FROM location_history
                WHERE id IN (SELECT id FROM to_delete)
                "#,
            )
            .bind(cutoff)
            .bind(batch_size)
            .execute(&self.pool)
            .await;
            timer.observe(&result);

            let deleted = result?.rows_affected();
            total_deleted += deleted;
            tracing::debug!(deleted, total_deleted, "Deleted batch of old readings");

            if deleted < batch_size as u64 {
                break;
            }

            tokio::task::yield_now().await;
        }

        if total_deleted > 0 {
            tracing::info!(%cutoff, total_deleted, "Purged readings older than cutoff");
        }
        Ok(total_deleted)
    }

    /// Totals for one device since `since`.
    pub async fn stats(
        &self,
        device_id: i64,
        since: DateTime<Utc>,
    ) -> Result<DeviceStatsEntity, sqlx::Error> {
        let timer = QueryTimer::new("device_stats");
        let result = sqlx::query_as::<_, DeviceStatsEntity>(
            r#"
            SELECT COUNT(*) AS total_updates,
                   COUNT(DISTINCT location_text_clean) AS unique_locations,
                   AVG(distance_meters)::DOUBLE PRECISION AS average_distance,
                   MAX(timestamp) AS last_movement
            FROM location_history
            WHERE device_id = $1 AND timestamp >= $2
            "#,
        )
        .bind(device_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Reading counts per clean location since `since`, most frequent first.
    pub async fn location_frequencies(
        &self,
        device_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LocationFrequencyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("location_frequencies");
        let result = sqlx::query_as::<_, LocationFrequencyEntity>(
            r#"
            SELECT location_text_clean AS location, COUNT(*) AS count
            FROM location_history
            WHERE device_id = $1 AND timestamp >= $2
            GROUP BY location_text_clean
            ORDER BY count DESC, location
            LIMIT $3
            "#,
        )
        .bind(device_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }
}

#[async_trait]
impl ReadingStore for LocationRepository {
    async fn insert_reading(
        &self,
        reading: NewLocationReading,
    ) -> Result<LocationReading, StorageError> {
        Ok(self.insert(&reading).await?.into())
    }
}

/// Escapes LIKE wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Home"), "Home");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\path"), "c:\\\\path");
    }
}
