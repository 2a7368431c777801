//! Location reading domain model.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::errors::IngestError;
use crate::services::distance::{format_distance, haversine_meters};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point, in meters.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        haversine_meters(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

impl From<Coordinates> for geo::Point<f64> {
    fn from(c: Coordinates) -> Self {
        geo::Point::new(c.longitude, c.latitude)
    }
}

impl From<geo::Point<f64>> for Coordinates {
    fn from(p: geo::Point<f64>) -> Self {
        Coordinates::new(p.y(), p.x())
    }
}

/// A persisted location reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReading {
    pub id: i64,
    pub device_id: i64,
    pub timestamp: DateTime<Utc>,
    pub location_text_raw: Option<String>,
    pub location_text_clean: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_meters: Option<i32>,
}

impl LocationReading {
    /// Coordinates, when both halves were geocoded.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Values for a reading about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationReading {
    pub device_id: i64,
    pub timestamp: DateTime<Utc>,
    pub location_text_raw: Option<String>,
    pub location_text_clean: String,
    pub coordinates: Option<Coordinates>,
    pub distance_meters: Option<i32>,
}

/// A reading as delivered by the capture collaborator.
///
/// Field names follow the capture output; the shorter forms are accepted as
/// aliases. Timestamps may be unix seconds or an RFC 3339 instant.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    #[serde(alias = "deviceName", alias = "name")]
    #[validate(length(max = 100, message = "Device name must be at most 100 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub device_name_raw: String,

    #[serde(default, alias = "locationText", alias = "location")]
    #[validate(length(max = 500, message = "Location text must be at most 500 characters"))]
    pub location_text_raw: Option<String>,

    #[serde(default, alias = "distance")]
    #[validate(length(max = 50, message = "Distance must be at most 50 characters"))]
    pub distance_raw: Option<String>,

    #[serde(deserialize_with = "deserialize_capture_timestamp")]
    #[validate(custom(function = "shared::validation::validate_not_future"))]
    pub timestamp: DateTime<Utc>,
}

impl RawReading {
    /// Parses and validates one loosely typed capture record.
    pub fn from_value(value: serde_json::Value) -> Result<Self, IngestError> {
        let reading: RawReading =
            serde_json::from_value(value).map_err(|e| IngestError::Parse(e.to_string()))?;
        reading
            .validate()
            .map_err(|e| IngestError::Parse(e.to_string()))?;
        Ok(reading)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaptureTimestamp {
    Seconds(i64),
    FractionalSeconds(f64),
    Instant(DateTime<Utc>),
}

fn deserialize_capture_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match CaptureTimestamp::deserialize(deserializer)? {
        CaptureTimestamp::Seconds(secs) => Utc.timestamp_opt(secs, 0).single(),
        CaptureTimestamp::FractionalSeconds(secs) if secs.is_finite() => {
            Utc.timestamp_millis_opt((secs * 1000.0).round() as i64).single()
        }
        CaptureTimestamp::FractionalSeconds(_) => None,
        CaptureTimestamp::Instant(instant) => Some(instant),
    };
    parsed.ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
}

/// Query parameters for reading lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MIN_LIMIT: i64 = 1;
    pub const MAX_LIMIT: i64 = 1000;

    /// Returns the effective limit, clamped to valid range.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(Self::MIN_LIMIT, Self::MAX_LIMIT)
    }
}

/// Query parameters for the timeline endpoint.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    pub limit: Option<i64>,
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub ref_lat: Option<f64>,
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub ref_lon: Option<f64>,
}

impl TimelineQuery {
    pub fn effective_limit(&self) -> i64 {
        HistoryQuery { limit: self.limit }.effective_limit()
    }

    /// The reference point, when both coordinates were supplied.
    pub fn reference(&self) -> Option<Coordinates> {
        match (self.ref_lat, self.ref_lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Query parameters for location search.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchLocationsQuery {
    #[validate(length(min = 1, max = 200, message = "Search text must be 1-200 characters"))]
    pub q: String,
    pub device_name: Option<String>,
    pub limit: Option<i64>,
}

impl SearchLocationsQuery {
    pub fn effective_limit(&self) -> i64 {
        HistoryQuery { limit: self.limit }.effective_limit()
    }
}

/// Reading enriched for display, as returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationItem {
    #[serde(flatten)]
    pub reading: LocationReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_display: Option<String>,
}

impl LocationItem {
    pub fn new(reading: LocationReading, device_name: Option<String>) -> Self {
        let distance_display = reading.distance_meters.map(|d| format_distance(f64::from(d)));
        Self {
            reading,
            device_name,
            distance_display,
        }
    }
}

/// Response for a device's history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistoryResponse {
    pub device_id: i64,
    pub device_name: String,
    pub locations: Vec<LocationItem>,
    pub count: usize,
}

/// Response for cross-device reading lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsResponse {
    pub locations: Vec<LocationItem>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(lat: Option<f64>, lon: Option<f64>) -> LocationReading {
        LocationReading {
            id: 1,
            device_id: 1,
            timestamp: Utc::now(),
            location_text_raw: Some("Home , 4 min ago".to_string()),
            location_text_clean: "Home".to_string(),
            latitude: lat,
            longitude: lon,
            distance_meters: Some(0),
        }
    }

    #[test]
    fn test_coordinates_require_both_halves() {
        assert_eq!(
            reading(Some(50.85), Some(4.35)).coordinates(),
            Some(Coordinates::new(50.85, 4.35))
        );
        assert!(reading(Some(50.85), None).coordinates().is_none());
        assert!(reading(None, None).coordinates().is_none());
    }

    #[test]
    fn test_coordinates_geo_point_conversion() {
        let coords = Coordinates::new(50.85, 4.35);
        let point: geo::Point<f64> = coords.into();
        assert_eq!(point.x(), 4.35);
        assert_eq!(point.y(), 50.85);
        assert_eq!(Coordinates::from(point), coords);
    }

    #[test]
    fn test_raw_reading_from_capture_record() {
        let raw = RawReading::from_value(json!({
            "deviceNameRaw": "BlackValize",
            "locationTextRaw": "Home , 4 min ago",
            "distanceRaw": "0 km",
            "timestamp": 1_700_000_000
        }))
        .unwrap();
        assert_eq!(raw.device_name_raw, "BlackValize");
        assert_eq!(raw.location_text_raw.as_deref(), Some("Home , 4 min ago"));
        assert_eq!(raw.distance_raw.as_deref(), Some("0 km"));
        assert_eq!(raw.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_raw_reading_accepts_aliases_and_iso_timestamp() {
        let raw = RawReading::from_value(json!({
            "name": "Keys",
            "location": "Work",
            "timestamp": "2024-03-01T10:15:00Z"
        }))
        .unwrap();
        assert_eq!(raw.device_name_raw, "Keys");
        assert_eq!(raw.location_text_raw.as_deref(), Some("Work"));
        assert!(raw.distance_raw.is_none());
        assert_eq!(raw.timestamp.to_rfc3339(), "2024-03-01T10:15:00+00:00");
    }

    #[test]
    fn test_raw_reading_fractional_seconds() {
        let raw = RawReading::from_value(json!({
            "deviceName": "Keys",
            "timestamp": 1_700_000_000.5
        }))
        .unwrap();
        assert_eq!(raw.timestamp.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_raw_reading_rejects_missing_name() {
        let err = RawReading::from_value(json!({ "timestamp": 1_700_000_000 })).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_raw_reading_rejects_blank_name() {
        let err = RawReading::from_value(json!({
            "deviceNameRaw": "   ",
            "timestamp": 1_700_000_000
        }))
        .unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_raw_reading_rejects_bad_timestamp() {
        let err = RawReading::from_value(json!({
            "deviceNameRaw": "Keys",
            "timestamp": "yesterday"
        }))
        .unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));

        let future = (Utc::now() + chrono::Duration::days(2)).timestamp();
        let err = RawReading::from_value(json!({
            "deviceNameRaw": "Keys",
            "timestamp": future
        }))
        .unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_raw_reading_rejects_non_object() {
        assert!(RawReading::from_value(json!("BlackValize")).is_err());
        assert!(RawReading::from_value(json!(null)).is_err());
    }

    #[test]
    fn test_history_query_limit_clamped() {
        assert_eq!(HistoryQuery::default().effective_limit(), 100);
        assert_eq!(HistoryQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(HistoryQuery { limit: Some(25) }.effective_limit(), 25);
        assert_eq!(HistoryQuery { limit: Some(50_000) }.effective_limit(), 1000);
    }

    #[test]
    fn test_timeline_query_reference() {
        let query = TimelineQuery {
            limit: None,
            ref_lat: Some(50.85),
            ref_lon: Some(4.35),
        };
        assert!(query.validate().is_ok());
        assert_eq!(query.reference(), Some(Coordinates::new(50.85, 4.35)));

        let partial = TimelineQuery {
            limit: None,
            ref_lat: Some(50.85),
            ref_lon: None,
        };
        assert!(partial.reference().is_none());

        let invalid = TimelineQuery {
            limit: None,
            ref_lat: Some(95.0),
            ref_lon: Some(4.35),
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_location_item_serialization() {
        let mut r = reading(None, None);
        r.distance_meters = Some(1500);
        let item = LocationItem::new(r, Some("Black Valize".to_string()));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["locationTextClean"], "Home");
        assert_eq!(json["deviceName"], "Black Valize");
        assert_eq!(json["distanceDisplay"], "1.5km");
        assert_eq!(json["distanceMeters"], 1500);
    }
}
