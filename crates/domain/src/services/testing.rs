//! In-memory store fakes shared by the service tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{GeocodeError, StorageError};
use crate::models::device::{Device, NewDevice};
use crate::models::location::{Coordinates, LocationReading, NewLocationReading};
use crate::services::device_resolver::DeviceStore;
use crate::services::geocoding::Geocoder;
use crate::services::ingestion::ReadingStore;

#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: Mutex<Vec<Device>>,
    next_id: AtomicUsize,
    failures: AtomicU32,
}

impl InMemoryDeviceStore {
    pub fn insert_existing(&self, name: &str) -> i64 {
        let now = Utc::now();
        let id = self.next_id();
        self.devices.lock().unwrap().push(Device {
            id,
            canonical_name: name.to_string(),
            device_type: None,
            first_seen: now,
            last_seen: now,
            is_active: true,
        });
        id
    }

    pub fn set_active(&self, id: i64, active: bool) {
        let mut devices = self.devices.lock().unwrap();
        if let Some(d) = devices.iter_mut().find(|d| d.id == id) {
            d.is_active = active;
        }
    }

    pub fn remove(&self, id: i64) {
        self.devices.lock().unwrap().retain(|d| d.id != id);
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// Makes the next `n` store calls fail.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn list_canonical_names(&self) -> Result<Vec<String>, StorageError> {
        self.check_failure()?;
        let devices = self.devices.lock().unwrap();
        Ok(devices.iter().map(|d| d.canonical_name.clone()).collect())
    }

    async fn find_by_canonical_name(&self, name: &str) -> Result<Option<Device>, StorageError> {
        self.check_failure()?;
        let devices = self.devices.lock().unwrap();
        Ok(devices.iter().find(|d| d.canonical_name == name).cloned())
    }

    async fn record_sighting(
        &self,
        device_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<Device>, StorageError> {
        self.check_failure()?;
        let mut devices = self.devices.lock().unwrap();
        Ok(devices.iter_mut().find(|d| d.id == device_id).map(|d| {
            d.last_seen = d.last_seen.max(seen_at);
            d.is_active = true;
            d.clone()
        }))
    }

    async fn create_or_get(&self, device: NewDevice) -> Result<(Device, bool), StorageError> {
        self.check_failure()?;
        // Yield so concurrent callers interleave like they would against a database
        tokio::task::yield_now().await;
        let mut devices = self.devices.lock().unwrap();
        if let Some(existing) = devices
            .iter_mut()
            .find(|d| d.canonical_name == device.canonical_name)
        {
            existing.last_seen = existing.last_seen.max(device.seen_at);
            existing.is_active = true;
            return Ok((existing.clone(), false));
        }
        let created = Device {
            id: self.next_id(),
            canonical_name: device.canonical_name,
            device_type: device.device_type,
            first_seen: device.seen_at,
            last_seen: device.seen_at,
            is_active: true,
        };
        devices.push(created.clone());
        Ok((created, true))
    }
}

#[derive(Default)]
pub struct InMemoryReadingStore {
    readings: Mutex<Vec<LocationReading>>,
    failures: AtomicU32,
    attempts: AtomicU32,
}

impl InMemoryReadingStore {
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn readings(&self) -> Vec<LocationReading> {
        self.readings.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn insert_reading(
        &self,
        reading: NewLocationReading,
    ) -> Result<LocationReading, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Database("insert failed".into()));
        }
        let mut readings = self.readings.lock().unwrap();
        let stored = LocationReading {
            id: readings.len() as i64 + 1,
            device_id: reading.device_id,
            timestamp: reading.timestamp,
            location_text_raw: reading.location_text_raw,
            location_text_clean: reading.location_text_clean,
            latitude: reading.coordinates.map(|c| c.latitude),
            longitude: reading.coordinates.map(|c| c.longitude),
            distance_meters: reading.distance_meters,
        };
        readings.push(stored.clone());
        Ok(stored)
    }
}

/// Geocoder answering from a fixed table, optionally slowly.
#[derive(Default)]
pub struct TableGeocoder {
    places: HashMap<String, Coordinates>,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicU32,
}

impl TableGeocoder {
    pub fn with_place(mut self, name: &str, coords: Coordinates) -> Self {
        self.places.insert(name.to_string(), coords);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GeocodeError::Request("upstream unavailable".into()));
        }
        Ok(self.places.get(query).copied())
    }
}
