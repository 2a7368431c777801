//! Device repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entities::{DeviceEntity, DeviceSummaryEntity, InactiveDeviceEntity, UpsertedDeviceEntity};
use crate::metrics::QueryTimer;
use domain::errors::StorageError;
use domain::models::device::{Device, NewDevice};
use domain::services::DeviceStore;

const SUMMARY_SELECT: &str = r#"
    SELECT d.id, d.canonical_name, d.device_type, d.first_seen, d.last_seen, d.is_active,
           c.location_count,
           l.location_text_clean AS latest_location_text,
           l.latitude AS latest_latitude,
           l.longitude AS latest_longitude,
           l.distance_meters AS latest_distance_meters,
           l.timestamp AS latest_timestamp
    FROM devices d
    LEFT JOIN LATERAL (
        SELECT location_text_clean, latitude, longitude, distance_meters, timestamp
        FROM location_history
        WHERE device_id = d.id
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
    ) l ON TRUE
    CROSS JOIN LATERAL (
        SELECT COUNT(*) AS location_count
        FROM location_history
        WHERE device_id = d.id
    ) c
"#;

/// Repository for device-related database operations.
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_id");
        let result = sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, canonical_name, device_type, first_seen, last_seen, is_active
            FROM devices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Exact lookup, as used by device resolution.
    pub async fn find_by_canonical_name(
        &self,
        name: &str,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_canonical_name");
        let result = sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, canonical_name, device_type, first_seen, last_seen, is_active
            FROM devices
            WHERE canonical_name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Lookup by name for API paths; an exact match wins over a case-insensitive one.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_name");
        let result = sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, canonical_name, device_type, first_seen, last_seen, is_active
            FROM devices
            WHERE LOWER(canonical_name) = LOWER($1)
            ORDER BY (canonical_name = $1) DESC, id
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    pub async fn list_canonical_names(&self) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("list_canonical_names");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT canonical_name
            FROM devices
            ORDER BY canonical_name
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Bumps `last_seen` (never backwards) and reactivates the device.
    pub async fn record_sighting(
        &self,
        id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("record_device_sighting");
        let result = sqlx::query_as::<_, DeviceEntity>(
            r#"
            UPDATE devices
            SET last_seen = GREATEST(last_seen, $2),
                is_active = TRUE
            WHERE id = $1
            RETURNING id, canonical_name, device_type, first_seen, last_seen, is_active
            "#,
        )
        .bind(id)
        .bind(seen_at)
        .fetch_optional(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Inserts a first sighting, or records a sighting on the existing row
    /// when another writer created the name first.
    pub async fn create_or_get(
        &self,
        canonical_name: &str,
        device_type: Option<&str>,
        seen_at: DateTime<Utc>,
    ) -> Result<UpsertedDeviceEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_or_get_device");
        let result = sqlx::query_as::<_, UpsertedDeviceEntity>(
            r#"
            INSERT INTO devices (canonical_name, device_type, first_seen, last_seen, is_active)
            VALUES ($1, $2, $3, $3, TRUE)
            ON CONFLICT (canonical_name) DO UPDATE SET
                last_seen = GREATEST(devices.last_seen, EXCLUDED.last_seen),
                is_active = TRUE
            RETURNING id, canonical_name, device_type, first_seen, last_seen, is_active,
                      (xmax = 0) AS inserted
            "#,
        )
        .bind(canonical_name)
        .bind(device_type)
        .bind(seen_at)
        .fetch_one(&self.pool)
        .await;
        timer.observe(&result);
        if let Ok(row) = &result {
            if !row.inserted {
                tracing::debug!(
                    device_id = row.device.id,
                    canonical_name,
                    "Device already existed, recorded sighting instead"
                );
            }
        }
        result
    }

    /// Lists devices with reading counts and latest location, most recently seen first.
    pub async fn list_summaries(
        &self,
        active_only: bool,
    ) -> Result<Vec<DeviceSummaryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_device_summaries");
        let query = format!(
            "{SUMMARY_SELECT} WHERE ($1 = FALSE OR d.is_active) ORDER BY d.last_seen DESC, d.id"
        );
        let result = sqlx::query_as::<_, DeviceSummaryEntity>(&query)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await;
        timer.observe(&result);
        result
    }

    pub async fn find_summary(&self, id: i64) -> Result<Option<DeviceSummaryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_summary");
        let query = format!("{SUMMARY_SELECT} WHERE d.id = $1");
        let result = sqlx::query_as::<_, DeviceSummaryEntity>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.observe(&result);
        result
    }

    /// Active devices not seen since `cutoff`, longest silent first.
    pub async fn find_inactive_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<InactiveDeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_inactive_devices");
        let result = sqlx::query_as::<_, InactiveDeviceEntity>(
            r#"
            SELECT d.id, d.canonical_name, d.device_type, d.first_seen, d.last_seen, d.is_active,
                   l.location_text_clean AS last_location_text
            FROM devices d
            LEFT JOIN LATERAL (
                SELECT location_text_clean
                FROM location_history
                WHERE device_id = d.id
                ORDER BY timestamp DESC, id DESC
                LIMIT 1
            ) l ON TRUE
            WHERE d.is_active AND d.last_seen < $1
            ORDER BY d.last_seen ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Flags active devices not seen since `cutoff` as inactive.
    pub async fn mark_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_devices_inactive");
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET is_active = FALSE
            WHERE is_active AND last_seen < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result?.rows_affected())
    }

    /// Deletes a device and, through the foreign key, all its readings.
    ///
    /// Returns the deleted device and how many readings went with it.
    pub async fn delete_device(
        &self,
        id: i64,
    ) -> Result<Option<(DeviceEntity, i64)>, sqlx::Error> {
        let timer = QueryTimer::new("delete_device");
        let mut tx = self.pool.begin().await?;

        let device = sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, canonical_name, device_type, first_seen, last_seen, is_active
            FROM devices
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(device) = device else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        let readings: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM location_history WHERE device_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        tracing::info!(
            device_id = id,
            canonical_name = %device.canonical_name,
            readings,
            "Deleted device and its readings"
        );
        Ok(Some((device, readings)))
    }
}

#[async_trait]
impl DeviceStore for DeviceRepository {
    async fn list_canonical_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(DeviceRepository::list_canonical_names(self).await?)
    }

    async fn find_by_canonical_name(&self, name: &str) -> Result<Option<Device>, StorageError> {
        Ok(DeviceRepository::find_by_canonical_name(self, name)
            .await?
            .map(Device::from))
    }

    async fn record_sighting(
        &self,
        device_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<Device>, StorageError> {
        Ok(DeviceRepository::record_sighting(self, device_id, seen_at)
            .await?
            .map(Device::from))
    }

    async fn create_or_get(&self, device: NewDevice) -> Result<(Device, bool), StorageError> {
        let upserted = DeviceRepository::create_or_get(
            self,
            &device.canonical_name,
            device.device_type.as_deref(),
            device.seen_at,
        )
        .await?;
        Ok((upserted.device.into(), upserted.inserted))
    }
}
