//! Batch ingestion endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::ingest::{IngestBatchRequest, IngestBatchResponse};
use domain::services::RegistrySnapshot;

/// Ingest one capture cycle of raw readings.
///
/// Every record gets its own outcome; invalid or unstorable records never
/// fail the request as a whole.
///
/// POST /api/v1/ingest
pub async fn ingest_readings(
    State(state): State<AppState>,
    Json(request): Json<IngestBatchRequest>,
) -> Result<Json<IngestBatchResponse>, ApiError> {
    let max_batch_size = state.config.ingestion.max_batch_size;
    if request.readings.len() > max_batch_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "Batch of {} readings exceeds the limit of {}",
            request.readings.len(),
            max_batch_size
        )));
    }

    // Names known at the start of the cycle; devices created during it are
    // added to this snapshot as they appear.
    let snapshot = Arc::new(RegistrySnapshot::load(&state.devices).await?);

    let outcomes = state
        .pipeline
        .ingest_batch(request.readings, snapshot)
        .await;

    Ok(Json(IngestBatchResponse::from(outcomes)))
}
