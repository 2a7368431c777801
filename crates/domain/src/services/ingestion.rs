//! The reading ingestion pipeline.
//!
//! Each raw reading goes through device resolution, text normalization,
//! bounded geocoding and distance parsing before one immutable row is
//! written. Batches fan out over a `JoinSet` and report one outcome per
//! reading.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::errors::{IngestError, StorageError};
use crate::models::ingest::{IngestOutcome, IngestedReading};
use crate::models::location::{Coordinates, LocationReading, NewLocationReading, RawReading};
use crate::services::device_resolver::{DeviceResolver, RegistrySnapshot};
use crate::services::geocoding::Geocoder;
use crate::services::text_normalizer::{is_location_available, normalize, parse_distance_meters};

/// Persistence of location readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert_reading(
        &self,
        reading: NewLocationReading,
    ) -> Result<LocationReading, StorageError>;
}

/// Tuning knobs of the pipeline.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Upper bound on the whole geocoding step of one reading.
    pub geocode_timeout: Duration,
    /// Extra attempts after a storage failure.
    pub storage_retries: u32,
    /// First retry delay; doubles on every further attempt.
    pub retry_backoff: Duration,
    /// Readings of one batch processed at the same time.
    pub max_concurrency: usize,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            geocode_timeout: Duration::from_secs(10),
            storage_retries: 3,
            retry_backoff: Duration::from_millis(200),
            max_concurrency: 4,
        }
    }
}

pub struct ReadingIngestionPipeline {
    resolver: DeviceResolver,
    readings: Arc<dyn ReadingStore>,
    geocoder: Arc<dyn Geocoder>,
    settings: IngestionSettings,
}

impl ReadingIngestionPipeline {
    pub fn new(
        resolver: DeviceResolver,
        readings: Arc<dyn ReadingStore>,
        geocoder: Arc<dyn Geocoder>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            resolver,
            readings,
            geocoder,
            settings,
        }
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &IngestionSettings {
        &self.settings
    }

    /// Ingests one validated reading.
    ///
    /// Storage failures are retried with exponential backoff, re-running
    /// device resolution each time. A device created by an attempt that
    /// later fails is kept.
    pub async fn ingest(
        &self,
        raw: &RawReading,
        snapshot: &RegistrySnapshot,
    ) -> Result<IngestedReading, IngestError> {
        let mut geocoded: Option<Option<Coordinates>> = None;
        let mut attempt: u32 = 0;
        loop {
            match self.ingest_once(raw, snapshot, &mut geocoded).await {
                Err(IngestError::Storage(err)) if attempt < self.settings.storage_retries => {
                    let delay = self.settings.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        device_name = %raw.device_name_raw,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Storage failure while ingesting reading, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(ingested) => {
                    metrics::counter!("readings_ingested_total").increment(1);
                    return Ok(ingested);
                }
                Err(err) => {
                    metrics::counter!("readings_failed_total", "kind" => err.kind()).increment(1);
                    return Err(err);
                }
            }
        }
    }

    async fn ingest_once(
        &self,
        raw: &RawReading,
        snapshot: &RegistrySnapshot,
        geocoded: &mut Option<Option<Coordinates>>,
    ) -> Result<IngestedReading, IngestError> {
        let resolution = self
            .resolver
            .resolve(&raw.device_name_raw, snapshot, Utc::now())
            .await?;

        let clean = normalize(raw.location_text_raw.as_deref());

        let coordinates = match *geocoded {
            Some(coordinates) => coordinates,
            None => {
                let coordinates = if is_location_available(&clean) {
                    self.geocode(&clean).await
                } else {
                    None
                };
                *geocoded = Some(coordinates);
                coordinates
            }
        };

        let distance_meters = parse_distance_meters(raw.distance_raw.as_deref());
        if distance_meters.is_none() && raw.distance_raw.is_some() {
            debug!(distance = ?raw.distance_raw, "Unparseable distance, storing none");
        }

        let reading = self
            .readings
            .insert_reading(NewLocationReading {
                device_id: resolution.device.id,
                timestamp: raw.timestamp,
                location_text_raw: raw.location_text_raw.clone(),
                location_text_clean: clean,
                coordinates,
                distance_meters,
            })
            .await?;

        info!(
            device_id = resolution.device.id,
            canonical_name = %resolution.device.canonical_name,
            reading_id = reading.id,
            location = %reading.location_text_clean,
            geocoded = coordinates.is_some(),
            "Reading stored"
        );

        Ok(IngestedReading {
            reading,
            canonical_name: resolution.device.canonical_name,
            device_created: resolution.created,
        })
    }

    /// Geocodes within the configured deadline. Failures yield `None`.
    async fn geocode(&self, clean: &str) -> Option<Coordinates> {
        let result =
            tokio::time::timeout(self.settings.geocode_timeout, self.geocoder.geocode(clean))
                .await;
        match result {
            Ok(Ok(Some(coordinates))) => {
                metrics::counter!("geocode_requests_total", "result" => "found").increment(1);
                Some(coordinates)
            }
            Ok(Ok(None)) => {
                metrics::counter!("geocode_requests_total", "result" => "not_found").increment(1);
                debug!(location = clean, "No geocoding result");
                None
            }
            Ok(Err(err)) => {
                metrics::counter!("geocode_requests_total", "result" => "error").increment(1);
                warn!(location = clean, error = %err, "Geocoding failed, storing without coordinates");
                None
            }
            Err(_) => {
                metrics::counter!("geocode_requests_total", "result" => "timeout").increment(1);
                warn!(
                    location = clean,
                    timeout_ms = self.settings.geocode_timeout.as_millis() as u64,
                    "Geocoding timed out, storing without coordinates"
                );
                None
            }
        }
    }

    /// Ingests a batch of loosely typed records concurrently.
    ///
    /// Returns exactly one outcome per record, ordered by batch index.
    /// Records that fail validation are reported and never retried.
    pub async fn ingest_batch(
        self: &Arc<Self>,
        records: Vec<serde_json::Value>,
        snapshot: Arc<RegistrySnapshot>,
    ) -> Vec<IngestOutcome> {
        let total = records.len();
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();
        let mut outcomes = Vec::with_capacity(total);

        for (index, record) in records.into_iter().enumerate() {
            let raw = match RawReading::from_value(record) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(index, error = %err, "Dropping invalid reading");
                    metrics::counter!("readings_failed_total", "kind" => err.kind()).increment(1);
                    outcomes.push(IngestOutcome::failed(index, &err));
                    continue;
                }
            };

            pending.insert(index);
            let pipeline = Arc::clone(self);
            let snapshot = Arc::clone(&snapshot);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, pipeline.ingest(&raw, &snapshot).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    pending.remove(&index);
                    outcomes.push(match result {
                        Ok(ingested) => IngestOutcome::stored(index, ingested),
                        Err(err) => {
                            warn!(index, error = %err, "Reading not stored");
                            IngestOutcome::failed(index, &err)
                        }
                    });
                }
                Err(join_err) => error!(error = %join_err, "Ingestion task aborted"),
            }
        }

        for index in pending {
            let err = IngestError::Internal("ingestion task aborted".to_string());
            outcomes.push(IngestOutcome::failed(index, &err));
        }

        outcomes.sort_by_key(|o| o.index);
        let stored = outcomes.iter().filter(|o| o.is_stored()).count();
        info!(
            total,
            stored,
            failed = total - stored,
            "Ingestion batch finished"
        );
        outcomes
    }
}
