//! Device domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::location::Coordinates;

/// Default lookback for the inactive devices endpoint, in hours.
pub const DEFAULT_INACTIVE_HOURS: i64 = 2;

/// A tracked AirTag, identified by its canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    pub canonical_name: String,
    pub device_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
}

/// Values for a device created on its first sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDevice {
    pub canonical_name: String,
    pub device_type: Option<String>,
    pub seen_at: DateTime<Utc>,
}

impl NewDevice {
    /// Builds a first sighting, guessing the device type from its name.
    pub fn first_sighting(canonical_name: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        let canonical_name = canonical_name.into();
        let device_type = Some(guess_device_type(&canonical_name).to_string());
        Self {
            canonical_name,
            device_type,
            seen_at,
        }
    }
}

/// Most recent reading of a device, as shown in listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLocation {
    pub location_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

/// Device with its reading count and latest location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: i64,
    pub canonical_name: String,
    pub device_type: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
    pub location_count: i64,
    pub latest_location: Option<LatestLocation>,
}

/// Query parameters for device listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDevicesQuery {
    pub active_only: Option<bool>,
}

/// Response for device listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDevicesResponse {
    pub devices: Vec<DeviceSummary>,
    pub count: usize,
}

/// Query parameters for the inactive devices endpoint.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InactiveDevicesQuery {
    #[validate(custom(function = "shared::validation::validate_lookback_hours"))]
    pub hours: Option<i64>,
}

impl InactiveDevicesQuery {
    pub fn effective_hours(&self) -> i64 {
        self.hours.unwrap_or(DEFAULT_INACTIVE_HOURS)
    }
}

/// An active device that stopped reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveDevice {
    pub id: i64,
    pub canonical_name: String,
    pub device_type: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub last_location_text: Option<String>,
    pub hours_since_last_seen: f64,
}

/// Response for the inactive devices endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InactiveDevicesResponse {
    pub hours: i64,
    pub devices: Vec<InactiveDevice>,
    pub count: usize,
}

/// Response for device deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDeviceResponse {
    pub device_id: i64,
    pub canonical_name: String,
    pub locations_deleted: i64,
}

/// Guesses a device category from keywords in its name.
pub fn guess_device_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if has(&["key"]) {
        "keys"
    } else if has(&["bag", "pack"]) {
        "bag"
    } else if has(&["valize", "valise", "luggage", "suitcase"]) {
        "luggage"
    } else if has(&["auto", "car"]) {
        "vehicle"
    } else if has(&["wallet", "portefeu"]) {
        "wallet"
    } else {
        "airtag"
    }
}
