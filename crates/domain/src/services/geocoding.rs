//! Geocoder abstraction and its bounded-retry wrapper.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::GeocodeError;
use crate::models::location::Coordinates;

/// Turns a clean location text into coordinates.
///
/// `Ok(None)` means the geocoder answered but knows no such place.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Geocoder used when geocoding is disabled; never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(None)
    }
}

/// Wraps a geocoder with a per-attempt timeout and bounded retries.
///
/// Only retryable errors are retried, with linear backoff between attempts.
pub struct BoundedGeocoder<G> {
    inner: G,
    attempt_timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl<G: Geocoder> BoundedGeocoder<G> {
    pub fn new(inner: G, attempt_timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempt_timeout,
            max_retries,
            backoff,
        }
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for BoundedGeocoder<G> {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.attempt_timeout, self.inner.geocode(query))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GeocodeError::Timeout(self.attempt_timeout.as_millis() as u64)),
            };

            match result {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(query, attempt, error = %err, "Geocoding attempt failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                other => {
                    debug!(query, attempts = attempt + 1, ok = other.is_ok(), "Geocoding finished");
                    return other;
                }
            }
        }
    }
}
