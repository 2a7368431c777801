//! Location endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::location::{
    HistoryQuery, LocationItem, LocationsResponse, SearchLocationsQuery,
};
use persistence::entities::LocationWithDeviceEntity;

fn to_response(rows: Vec<LocationWithDeviceEntity>) -> LocationsResponse {
    let locations: Vec<LocationItem> = rows
        .into_iter()
        .map(|row| LocationItem::new(row.location.into(), Some(row.device_name)))
        .collect();
    LocationsResponse {
        count: locations.len(),
        locations,
    }
}

/// Most recent readings across all devices.
///
/// GET /api/v1/locations?limit=100
pub async fn list_recent_locations(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<LocationsResponse>, ApiError> {
    let rows = state.locations.find_recent(query.effective_limit()).await?;
    Ok(Json(to_response(rows)))
}

/// Readings whose clean location contains `q`.
///
/// GET /api/v1/locations/search?q=station&deviceName=Keys&limit=50
pub async fn search_locations(
    State(state): State<AppState>,
    Query(query): Query<SearchLocationsQuery>,
) -> Result<Json<LocationsResponse>, ApiError> {
    query.validate()?;
    let text = query.q.trim();
    if text.is_empty() {
        return Err(ApiError::validation("Search text must not be blank"));
    }

    let rows = state
        .locations
        .search(text, query.device_name.as_deref(), query.effective_limit())
        .await?;
    Ok(Json(to_response(rows)))
}

/// Delete a single reading.
///
/// DELETE /api/v1/locations/:id
pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.locations.delete(id).await? {
        return Err(ApiError::NotFound(format!("Location {} not found", id)));
    }

    info!(location_id = id, "Location deleted");
    Ok(StatusCode::NO_CONTENT)
}
