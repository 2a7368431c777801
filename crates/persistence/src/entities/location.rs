//! Location history entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::location::LocationReading;
use domain::models::stats::LocationFrequency;
use sqlx::FromRow;

/// Database row mapping for the location_history table.
#[derive(Debug, Clone, FromRow)]
pub struct LocationEntity {
    pub id: i64,
    pub device_id: i64,
    pub timestamp: DateTime<Utc>,
    pub location_text_raw: Option<String>,
    pub location_text_clean: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_meters: Option<i32>,
}

impl From<LocationEntity> for LocationReading {
    fn from(entity: LocationEntity) -> Self {
        Self {
            id: entity.id,
            device_id: entity.device_id,
            timestamp: entity.timestamp,
            location_text_raw: entity.location_text_raw,
            location_text_clean: entity.location_text_clean,
            latitude: entity.latitude,
            longitude: entity.longitude,
            distance_meters: entity.distance_meters,
        }
    }
}

/// Reading joined with the name of its device.
#[derive(Debug, Clone, FromRow)]
pub struct LocationWithDeviceEntity {
    #[sqlx(flatten)]
    pub location: LocationEntity,
    pub device_name: String,
}

/// Count of readings per clean location.
#[derive(Debug, Clone, FromRow)]
pub struct LocationFrequencyEntity {
    pub location: String,
    pub count: i64,
}

impl From<LocationFrequencyEntity> for LocationFrequency {
    fn from(entity: LocationFrequencyEntity) -> Self {
        Self {
            location: entity.location,
            count: entity.count,
        }
    }
}

/// Aggregates for one device over a period.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceStatsEntity {
    pub total_updates: i64,
    pub unique_locations: i64,
    pub average_distance: Option<f64>,
    pub last_movement: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_entity_to_domain() {
        let now = Utc::now();
        let reading: LocationReading = LocationEntity {
            id: 42,
            device_id: 7,
            timestamp: now,
            location_text_raw: Some("Home , Now".to_string()),
            location_text_clean: "Home".to_string(),
            latitude: Some(51.05),
            longitude: Some(3.72),
            distance_meters: Some(0),
        }
        .into();

        assert_eq!(reading.id, 42);
        assert_eq!(reading.device_id, 7);
        assert_eq!(reading.timestamp, now);
        assert_eq!(reading.location_text_clean, "Home");
        assert!(reading.coordinates().is_some());
    }

    #[test]
    fn test_frequency_entity_to_domain() {
        let freq: LocationFrequency = LocationFrequencyEntity {
            location: "Work".to_string(),
            count: 9,
        }
        .into();
        assert_eq!(freq.location, "Work");
        assert_eq!(freq.count, 9);
    }
}
