//! Device endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::device::{
    DeleteDeviceResponse, Device, DeviceSummary, InactiveDevicesQuery, InactiveDevicesResponse,
    ListDevicesQuery, ListDevicesResponse,
};
use domain::models::location::{
    HistoryQuery, LocationHistoryResponse, LocationItem, LocationReading, TimelineQuery,
};
use domain::models::stats::{DeviceStats, LocationFrequency, StatsPeriod, StatsQuery};
use domain::models::visit::{TimelineResponse, VisitGroupView};
use domain::services::group_visits;

/// Resolves a path segment to a device by name, case-insensitively.
async fn device_by_name(state: &AppState, name: &str) -> Result<Device, ApiError> {
    state
        .devices
        .find_by_name(name)
        .await?
        .map(Device::from)
        .ok_or_else(|| ApiError::NotFound(format!("Device '{}' not found", name)))
}

/// List devices with reading counts and latest location.
///
/// GET /api/v1/devices?activeOnly=true
pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<ListDevicesQuery>,
) -> Result<Json<ListDevicesResponse>, ApiError> {
    let devices: Vec<DeviceSummary> = state
        .devices
        .list_summaries(query.active_only.unwrap_or(false))
        .await?
        .into_iter()
        .map(DeviceSummary::from)
        .collect();

    Ok(Json(ListDevicesResponse {
        count: devices.len(),
        devices,
    }))
}

/// Active devices silent for longer than `hours`.
///
/// GET /api/v1/devices/inactive?hours=2
pub async fn list_inactive_devices(
    State(state): State<AppState>,
    Query(query): Query<InactiveDevicesQuery>,
) -> Result<Json<InactiveDevicesResponse>, ApiError> {
    query.validate()?;
    let hours = query.effective_hours();
    let now = Utc::now();

    let devices: Vec<_> = state
        .devices
        .find_inactive_since(now - chrono::Duration::hours(hours))
        .await?
        .into_iter()
        .map(|entity| entity.into_domain(now))
        .collect();

    Ok(Json(InactiveDevicesResponse {
        hours,
        count: devices.len(),
        devices,
    }))
}

/// Device detail.
///
/// GET /api/v1/devices/:name
pub async fn get_device(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeviceSummary>, ApiError> {
    let device = device_by_name(&state, &name).await?;
    let summary = state
        .devices
        .find_summary(device.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Device '{}' not found", name)))?;

    Ok(Json(summary.into()))
}

/// Newest-first readings of one device.
///
/// GET /api/v1/devices/:name/history?limit=100
pub async fn get_device_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<LocationHistoryResponse>, ApiError> {
    let device = device_by_name(&state, &name).await?;

    let locations: Vec<LocationItem> = state
        .locations
        .find_by_device(device.id, query.effective_limit())
        .await?
        .into_iter()
        .map(|entity| LocationItem::new(entity.into(), None))
        .collect();

    Ok(Json(LocationHistoryResponse {
        device_id: device.id,
        device_name: device.canonical_name,
        count: locations.len(),
        locations,
    }))
}

/// History grouped into visits, with live distances when a reference is given.
///
/// GET /api/v1/devices/:name/timeline?limit=100&refLat=..&refLon=..
pub async fn get_device_timeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<TimelineResponse>, ApiError> {
    query.validate()?;
    if query.ref_lat.is_some() != query.ref_lon.is_some() {
        return Err(ApiError::validation(
            "refLat and refLon must be supplied together",
        ));
    }

    let device = device_by_name(&state, &name).await?;
    let readings: Vec<LocationReading> = state
        .locations
        .find_by_device(device.id, query.effective_limit())
        .await?
        .into_iter()
        .map(LocationReading::from)
        .collect();

    let reference = query.reference();
    let groups: Vec<VisitGroupView> = group_visits(&readings)
        .iter()
        .map(|group| VisitGroupView::from_group(group, reference))
        .collect();

    Ok(Json(TimelineResponse {
        device_id: device.id,
        device_name: device.canonical_name,
        reference,
        group_count: groups.len(),
        reading_count: readings.len(),
        groups,
    }))
}

/// Activity statistics over a period such as `24h`, `7d` or `2w`.
///
/// GET /api/v1/devices/:name/stats?period=7d
pub async fn get_device_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DeviceStats>, ApiError> {
    let period = match query.period.as_deref() {
        Some(raw) => raw.parse::<StatsPeriod>().map_err(ApiError::validation)?,
        None => StatsPeriod::default(),
    };

    let device = device_by_name(&state, &name).await?;
    let since = Utc::now() - period.duration();

    let totals = state.locations.stats(device.id, since).await?;
    let frequencies: Vec<LocationFrequency> = state
        .locations
        .location_frequencies(device.id, since, 10)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(DeviceStats {
        device_name: device.canonical_name,
        period: period.to_string(),
        total_updates: totals.total_updates,
        unique_locations: totals.unique_locations,
        most_frequent_location: frequencies.first().map(|f| f.location.clone()),
        location_frequencies: frequencies,
        average_distance_meters: totals.average_distance.map(|d| d.round()),
        average_updates_per_day: DeviceStats::average_per_day(totals.total_updates, &period),
        last_movement: totals.last_movement,
    }))
}

/// Delete a device and all its readings.
///
/// DELETE /api/v1/devices/:id
pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteDeviceResponse>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid device id '{}'", id)))?;

    let (device, locations_deleted) = state
        .devices
        .delete_device(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Device {} not found", id)))?;

    info!(
        device_id = device.id,
        canonical_name = %device.canonical_name,
        locations_deleted,
        "Device deleted"
    );

    Ok(Json(DeleteDeviceResponse {
        device_id: device.id,
        canonical_name: device.canonical_name,
        locations_deleted,
    }))
}
