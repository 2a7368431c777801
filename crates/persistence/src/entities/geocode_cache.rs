//! Geocode cache entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::location::Coordinates;
use sqlx::FromRow;

/// Database row mapping for the geocode_cache table.
///
/// Null coordinates record a lookup that found nothing.
#[derive(Debug, Clone, FromRow)]
pub struct GeocodeCacheEntity {
    pub query: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl GeocodeCacheEntity {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}
