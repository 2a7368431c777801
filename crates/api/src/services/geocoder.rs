//! Nominatim geocoding client.
//!
//! Lookups go through, in order: configured custom locations, the
//! `geocode_cache` table, then the upstream search API. Upstream calls are
//! spaced by a `governor` limiter so the public instance's usage policy
//! (one request per second) is respected.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use domain::errors::GeocodeError;
use domain::models::location::Coordinates;
use domain::services::{BoundedGeocoder, Geocoder, NoopGeocoder};
use persistence::repositories::GeocodeCacheRepository;

use crate::config::GeocodingConfig;

/// One search hit. Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// Geocoder backed by a Nominatim-compatible search endpoint.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    timeout_ms: u64,
    limiter: DefaultDirectRateLimiter,
    custom_locations: HashMap<String, Coordinates>,
    cache: Option<GeocodeCacheRepository>,
    cache_ttl: chrono::Duration,
}

impl NominatimGeocoder {
    pub fn new(
        config: &GeocodingConfig,
        cache: Option<GeocodeCacheRepository>,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let custom_locations = config
            .custom_locations
            .iter()
            .map(|place| {
                (
                    custom_key(&place.name),
                    Coordinates {
                        latitude: place.latitude,
                        longitude: place.longitude,
                    },
                )
            })
            .collect();

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout_ms: config.timeout_ms,
            limiter: RateLimiter::direct(spacing_quota(config.min_interval())),
            custom_locations,
            cache,
            cache_ttl: chrono::Duration::days(i64::from(config.cache_ttl_days)),
        })
    }

    fn custom_location(&self, query: &str) -> Option<Coordinates> {
        self.custom_locations.get(&custom_key(query)).copied()
    }

    async fn cached(&self, query: &str) -> Option<Option<Coordinates>> {
        let cache = self.cache.as_ref()?;
        match cache.find_fresh(query, Utc::now() - self.cache_ttl).await {
            Ok(entry) => entry.map(|e| e.coordinates()),
            Err(e) => {
                warn!(query, error = %e, "Geocode cache lookup failed");
                None
            }
        }
    }

    async fn remember(&self, query: &str, coordinates: Option<Coordinates>) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.upsert(query, coordinates).await {
                warn!(query, error = %e, "Failed to cache geocode result");
            }
        }
    }

    async fn search(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.limiter.until_ready().await;

        debug!(query, "Calling geocoding API");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout(self.timeout_ms)
                } else {
                    GeocodeError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Request(format!("HTTP {}", status)));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        first_coordinates(&places)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        if let Some(coordinates) = self.custom_location(query) {
            return Ok(Some(coordinates));
        }

        if let Some(cached) = self.cached(query).await {
            return Ok(cached);
        }

        let found = self.search(query).await?;
        self.remember(query, found).await;
        Ok(found)
    }
}

/// Builds the geocoder the ingestion pipeline uses.
///
/// Disabled geocoding yields a geocoder that never finds anything.
pub fn build_geocoder(
    config: &GeocodingConfig,
    cache: GeocodeCacheRepository,
) -> Result<Arc<dyn Geocoder>, GeocodeError> {
    if !config.enabled {
        return Ok(Arc::new(NoopGeocoder));
    }

    let nominatim = NominatimGeocoder::new(config, Some(cache))?;
    Ok(Arc::new(BoundedGeocoder::new(
        nominatim,
        config.timeout(),
        config.max_retries,
        config.retry_backoff(),
    )))
}

fn custom_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Quota allowing one request per `interval`, at least one second apart.
fn spacing_quota(interval: Duration) -> Quota {
    Quota::with_period(interval.max(Duration::from_secs(1)))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN)
}

fn first_coordinates(places: &[NominatimPlace]) -> Result<Option<Coordinates>, GeocodeError> {
    let Some(place) = places.first() else {
        return Ok(None);
    };

    let parse = |value: &str| {
        value
            .parse::<f64>()
            .map_err(|e| GeocodeError::InvalidResponse(format!("bad coordinate '{}': {}", value, e)))
    };
    let coordinates = Coordinates {
        latitude: parse(&place.lat)?,
        longitude: parse(&place.lon)?,
    };

    if !(-90.0..=90.0).contains(&coordinates.latitude)
        || !(-180.0..=180.0).contains(&coordinates.longitude)
    {
        return Err(GeocodeError::InvalidResponse(format!(
            "coordinates out of range: {}, {}",
            coordinates.latitude, coordinates.longitude
        )));
    }

    Ok(Some(coordinates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomLocation;

    fn config() -> GeocodingConfig {
        GeocodingConfig {
            custom_locations: vec![CustomLocation {
                name: "Home".into(),
                latitude: 50.8503,
                longitude: 4.3517,
            }],
            ..GeocodingConfig::default()
        }
    }

    fn place(lat: &str, lon: &str) -> NominatimPlace {
        NominatimPlace {
            lat: lat.into(),
            lon: lon.into(),
        }
    }

    #[test]
    fn test_first_coordinates_parses_strings() {
        let found = first_coordinates(&[place("50.8466", "4.3528"), place("0", "0")]).unwrap();
        assert_eq!(
            found,
            Some(Coordinates {
                latitude: 50.8466,
                longitude: 4.3528
            })
        );
    }

    #[test]
    fn test_first_coordinates_empty_is_miss() {
        assert_eq!(first_coordinates(&[]).unwrap(), None);
    }

    #[test]
    fn test_first_coordinates_rejects_garbage() {
        assert!(matches!(
            first_coordinates(&[place("north", "4.35")]),
            Err(GeocodeError::InvalidResponse(_))
        ));
        assert!(matches!(
            first_coordinates(&[place("95.0", "4.35")]),
            Err(GeocodeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_nominatim_response_shape() {
        let body = r#"[{"place_id": 1, "lat": "51.2194", "lon": "4.4025", "display_name": "Antwerpen"}]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(body).unwrap();
        let found = first_coordinates(&places).unwrap().unwrap();
        assert!((found.latitude - 51.2194).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_custom_location_short_circuits() {
        let geocoder = NominatimGeocoder::new(&config(), None).unwrap();
        let found = geocoder.geocode("  home ").await.unwrap().unwrap();
        assert_eq!(found.latitude, 50.8503);
        assert_eq!(found.longitude, 4.3517);
    }

    #[test]
    fn test_spacing_quota_never_below_one_second() {
        let quota = spacing_quota(Duration::from_millis(10));
        assert_eq!(quota.replenish_interval(), Duration::from_secs(1));
        assert_eq!(quota.burst_size().get(), 1);

        let quota = spacing_quota(Duration::from_secs(2));
        assert_eq!(quota.replenish_interval(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_build_geocoder_disabled() {
        let disabled = GeocodingConfig {
            enabled: false,
            ..GeocodingConfig::default()
        };
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let geocoder = build_geocoder(&disabled, GeocodeCacheRepository::new(pool)).unwrap();
        assert_eq!(geocoder.geocode("Brussels").await.unwrap(), None);
    }
}
