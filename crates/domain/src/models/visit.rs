//! Visit groups: runs of consecutive readings at the same place.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::location::{Coordinates, LocationReading};
use crate::services::distance::format_distance;

/// A derived run of consecutive readings sharing one clean location.
///
/// Borrows its members from the fetched reading list; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitGroup<'a> {
    pub locations: Vec<&'a LocationReading>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Coordinates of the last member in scan order that had any.
    pub representative_coordinates: Option<Coordinates>,
    /// Distance of the first member in scan order.
    pub representative_distance: Option<i32>,
}

impl<'a> VisitGroup<'a> {
    pub fn start(first: &'a LocationReading) -> Self {
        Self {
            locations: vec![first],
            start_time: first.timestamp,
            end_time: first.timestamp,
            representative_coordinates: first.coordinates(),
            representative_distance: first.distance_meters,
        }
    }

    pub fn extend(&mut self, reading: &'a LocationReading) {
        self.start_time = self.start_time.min(reading.timestamp);
        self.end_time = self.end_time.max(reading.timestamp);
        if let Some(coords) = reading.coordinates() {
            self.representative_coordinates = Some(coords);
        }
        self.locations.push(reading);
    }

    pub fn clean_location(&self) -> &str {
        self.locations
            .first()
            .map(|r| r.location_text_clean.as_str())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Serializable form of a visit group, with distances resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitGroupView {
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub count: usize,
    pub representative_coordinates: Option<Coordinates>,
    pub representative_distance_meters: Option<i32>,
    pub representative_distance_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_distance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_distance_display: Option<String>,
    pub locations: Vec<LocationReading>,
}

impl VisitGroupView {
    /// Resolves a group for display, measuring from `reference` when given.
    pub fn from_group(group: &VisitGroup<'_>, reference: Option<Coordinates>) -> Self {
        let live_distance_meters = match (reference, group.representative_coordinates) {
            (Some(from), Some(to)) => Some(from.distance_to(&to).round()),
            _ => None,
        };

        Self {
            location: group.clean_location().to_string(),
            start_time: group.start_time,
            end_time: group.end_time,
            duration_minutes: (group.end_time - group.start_time).num_minutes(),
            count: group.len(),
            representative_coordinates: group.representative_coordinates,
            representative_distance_meters: group.representative_distance,
            representative_distance_display: group
                .representative_distance
                .map(|d| format_distance(f64::from(d))),
            live_distance_meters,
            live_distance_display: live_distance_meters.map(format_distance),
            locations: group.locations.iter().map(|r| (*r).clone()).collect(),
        }
    }
}

/// Response for the timeline endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    pub device_id: i64,
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Coordinates>,
    pub groups: Vec<VisitGroupView>,
    pub group_count: usize,
    pub reading_count: usize,
}
