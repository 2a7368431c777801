//! Device entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::device::{DeviceSummary, InactiveDevice, LatestLocation};
use domain::models::location::Coordinates;
use sqlx::FromRow;

/// Database row mapping for the devices table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceEntity {
    pub id: i64,
    pub canonical_name: String,
    pub device_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
}

impl From<DeviceEntity> for domain::models::Device {
    fn from(entity: DeviceEntity) -> Self {
        Self {
            id: entity.id,
            canonical_name: entity.canonical_name,
            device_type: entity.device_type,
            first_seen: entity.first_seen,
            last_seen: entity.last_seen,
            is_active: entity.is_active,
        }
    }
}

/// Device row returned by the create-or-get upsert.
#[derive(Debug, Clone, FromRow)]
pub struct UpsertedDeviceEntity {
    #[sqlx(flatten)]
    pub device: DeviceEntity,
    /// True when the row was inserted rather than updated.
    pub inserted: bool,
}

/// Device row joined with its reading count and latest reading.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceSummaryEntity {
    #[sqlx(flatten)]
    pub device: DeviceEntity,
    pub location_count: i64,
    pub latest_location_text: Option<String>,
    pub latest_latitude: Option<f64>,
    pub latest_longitude: Option<f64>,
    pub latest_distance_meters: Option<i32>,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

impl From<DeviceSummaryEntity> for DeviceSummary {
    fn from(entity: DeviceSummaryEntity) -> Self {
        let coordinates = match (entity.latest_latitude, entity.latest_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        let latest_location = match (entity.latest_location_text, entity.latest_timestamp) {
            (Some(location_text), Some(timestamp)) => Some(LatestLocation {
                location_text,
                coordinates,
                distance_meters: entity.latest_distance_meters,
                timestamp,
            }),
            _ => None,
        };
        let device = entity.device;
        Self {
            id: device.id,
            canonical_name: device.canonical_name,
            device_type: device.device_type,
            first_seen: device.first_seen,
            last_seen: device.last_seen,
            is_active: device.is_active,
            location_count: entity.location_count,
            latest_location,
        }
    }
}

/// Active device that stopped reporting.
#[derive(Debug, Clone, FromRow)]
pub struct InactiveDeviceEntity {
    #[sqlx(flatten)]
    pub device: DeviceEntity,
    pub last_location_text: Option<String>,
}

impl InactiveDeviceEntity {
    pub fn into_domain(self, now: DateTime<Utc>) -> InactiveDevice {
        let hours = (now - self.device.last_seen).num_minutes() as f64 / 60.0;
        InactiveDevice {
            id: self.device.id,
            canonical_name: self.device.canonical_name,
            device_type: self.device.device_type,
            last_seen: self.device.last_seen,
            last_location_text: self.last_location_text,
            hours_since_last_seen: (hours * 10.0).round() / 10.0,
        }
    }
}
