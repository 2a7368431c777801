//! Common validation utilities.

use chrono::{DateTime, Duration, Utc};
use validator::ValidationError;

/// Maximum allowed future timestamp tolerance in seconds (5 minutes for clock skew).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 300;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Rejects strings that are empty or contain only whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates that a capture timestamp is not in the future.
///
/// A few minutes of skew are tolerated since the capture host and the
/// backend do not share a clock.
pub fn validate_not_future(timestamp: &DateTime<Utc>) -> Result<(), ValidationError> {
    let future_limit = Utc::now() + Duration::seconds(MAX_FUTURE_TOLERANCE_SECS);
    if *timestamp > future_limit {
        let mut err = ValidationError::new("timestamp_future");
        err.message = Some("Timestamp cannot be in the future".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a lookback window in hours (1 hour to 1 week).
pub fn validate_lookback_hours(hours: i64) -> Result<(), ValidationError> {
    if (1..=168).contains(&hours) {
        Ok(())
    } else {
        let mut err = ValidationError::new("hours_range");
        err.message = Some("Hours must be between 1 and 168".into());
        Err(err)
    }
}
