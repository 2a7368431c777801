//! Batch ingestion request and per-reading outcomes.

use serde::{Deserialize, Serialize};

use super::location::LocationReading;
use crate::errors::IngestError;

/// Batch of raw capture records.
///
/// Records are kept as loose JSON so that one malformed record becomes a
/// failed outcome instead of rejecting the whole batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatchRequest {
    pub readings: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Stored,
    Failed,
}

/// Why a reading was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    pub kind: String,
    pub message: String,
}

impl From<&IngestError> for IngestFailure {
    fn from(err: &IngestError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of ingesting one reading of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    /// Position of the reading in the submitted batch.
    pub index: usize,
    pub status: IngestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<LocationReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IngestFailure>,
}

impl IngestOutcome {
    pub fn stored(index: usize, ingested: IngestedReading) -> Self {
        Self {
            index,
            status: IngestStatus::Stored,
            canonical_name: Some(ingested.canonical_name),
            device_created: Some(ingested.device_created),
            reading: Some(ingested.reading),
            error: None,
        }
    }

    pub fn failed(index: usize, err: &IngestError) -> Self {
        Self {
            index,
            status: IngestStatus::Failed,
            canonical_name: None,
            device_created: None,
            reading: None,
            error: Some(err.into()),
        }
    }

    pub fn is_stored(&self) -> bool {
        self.status == IngestStatus::Stored
    }
}

/// A reading that made it to storage, with the device it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedReading {
    pub reading: LocationReading,
    pub canonical_name: String,
    pub device_created: bool,
}

/// Response for a batch ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatchResponse {
    pub processed: usize,
    pub stored: usize,
    pub failed: usize,
    pub outcomes: Vec<IngestOutcome>,
}

impl From<Vec<IngestOutcome>> for IngestBatchResponse {
    fn from(outcomes: Vec<IngestOutcome>) -> Self {
        let stored = outcomes.iter().filter(|o| o.is_stored()).count();
        Self {
            processed: outcomes.len(),
            stored,
            failed: outcomes.len() - stored,
            outcomes,
        }
    }
}
