//! Resolution of raw device names to canonical devices.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{IngestError, StorageError};
use crate::models::device::{Device, NewDevice};
use crate::services::fuzzy_matcher::FuzzyDeviceMatcher;
use crate::services::text_normalizer::tidy_device_name;

/// Device registry operations needed by the resolver.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn list_canonical_names(&self) -> Result<Vec<String>, StorageError>;

    async fn find_by_canonical_name(&self, name: &str) -> Result<Option<Device>, StorageError>;

    /// Bumps `last_seen` and reactivates the device. `None` if it no longer exists.
    async fn record_sighting(
        &self,
        device_id: i64,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<Device>, StorageError>;

    /// Inserts the device, or returns the existing one with the same name.
    /// The flag is true when a row was inserted.
    async fn create_or_get(&self, device: NewDevice) -> Result<(Device, bool), StorageError>;
}

/// Canonical names known at the start of an ingestion cycle.
///
/// Devices created during the cycle are added so later readings of the
/// same cycle match them.
#[derive(Debug)]
pub struct RegistrySnapshot {
    names: RwLock<BTreeSet<String>>,
    taken_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            names: RwLock::new(names.into_iter().collect()),
            taken_at: Utc::now(),
        }
    }

    /// Reads the current registry from the store.
    pub async fn load(store: &dyn DeviceStore) -> Result<Self, StorageError> {
        Ok(Self::new(store.list_canonical_names().await?))
    }

    pub fn names(&self) -> Vec<String> {
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        names.iter().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    fn remember(&self, name: &str) {
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        names.insert(name.to_string());
    }
}

/// Outcome of resolving one raw name.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub device: Device,
    pub created: bool,
    /// Match score when an existing device was found.
    pub score: Option<u8>,
}

/// Finds or creates the canonical device for a raw name.
pub struct DeviceResolver {
    store: Arc<dyn DeviceStore>,
    matcher: FuzzyDeviceMatcher,
    creation_lock: Mutex<()>,
}

impl DeviceResolver {
    pub fn new(store: Arc<dyn DeviceStore>, matcher: FuzzyDeviceMatcher) -> Self {
        Self {
            store,
            matcher,
            creation_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &dyn DeviceStore {
        self.store.as_ref()
    }

    /// Resolves `raw_name` against the snapshot, creating the device on a miss.
    ///
    /// Creation is serialized and re-matches under the lock, so two spellings
    /// of a new device seen concurrently still end up as one device.
    pub async fn resolve(
        &self,
        raw_name: &str,
        snapshot: &RegistrySnapshot,
        now: DateTime<Utc>,
    ) -> Result<Resolution, IngestError> {
        let name = tidy_device_name(raw_name);
        if name.is_empty() {
            return Err(IngestError::Parse(format!(
                "Device name '{raw_name}' has no usable characters"
            )));
        }

        if let Some(resolution) = self.resolve_known(&name, snapshot, now).await? {
            return Ok(resolution);
        }

        let _guard = self.creation_lock.lock().await;
        if let Some(resolution) = self.resolve_known(&name, snapshot, now).await? {
            return Ok(resolution);
        }

        let (device, created) = self
            .store
            .create_or_get(NewDevice::first_sighting(name.as_str(), now))
            .await?;
        snapshot.remember(&device.canonical_name);

        if created {
            metrics::counter!("devices_created_total").increment(1);
            info!(
                device_id = device.id,
                canonical_name = %device.canonical_name,
                device_type = ?device.device_type,
                "New device registered"
            );
        }

        Ok(Resolution {
            device,
            created,
            score: None,
        })
    }

    async fn resolve_known(
        &self,
        name: &str,
        snapshot: &RegistrySnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<Resolution>, StorageError> {
        let known = snapshot.names();
        let Some(found) = self
            .matcher
            .best_match(name, known.iter().map(String::as_str))
        else {
            return Ok(None);
        };

        let Some(device) = self.store.find_by_canonical_name(&found.name).await? else {
            debug!(canonical_name = %found.name, "Matched device no longer exists");
            return Ok(None);
        };

        let Some(device) = self.store.record_sighting(device.id, now).await? else {
            return Ok(None);
        };

        debug!(
            raw_name = name,
            canonical_name = %device.canonical_name,
            score = found.score,
            "Resolved device"
        );

        Ok(Some(Resolution {
            device,
            created: false,
            score: Some(found.score),
        }))
    }
}
