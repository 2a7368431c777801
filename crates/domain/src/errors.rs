//! Domain error types.

use thiserror::Error;

/// Failure reported by a store implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(err.to_string())
            }
            other => StorageError::Database(other.to_string()),
        }
    }
}

/// Failure reported by a geocoder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("Geocoding timed out after {0}ms")]
    Timeout(u64),

    #[error("Geocoding request failed: {0}")]
    Request(String),

    #[error("Geocoder returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Geocoding rate limited")]
    RateLimited,
}

impl GeocodeError {
    /// Timeouts, transport errors and rate limiting are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GeocodeError::InvalidResponse(_))
    }
}

/// Errors raised while ingesting a single raw reading.
///
/// Geocoding failures never appear here; they degrade to missing
/// coordinates inside the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Invalid reading: {0}")]
    Parse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Stable machine-readable kind used in batch outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Parse(_) => "parse_error",
            IngestError::Storage(_) => "storage_error",
            IngestError::Internal(_) => "internal_error",
        }
    }
}
