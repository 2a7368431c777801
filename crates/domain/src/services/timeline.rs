//! Grouping of consecutive readings into visits.

use crate::models::location::LocationReading;
use crate::models::visit::VisitGroup;

/// Groups readings into runs of equal clean location, in one pass.
///
/// Readings are expected newest first and keep their order inside each
/// group. Only adjacent readings are merged: a device that goes home, to
/// work and home again yields three groups.
pub fn group_visits(readings: &[LocationReading]) -> Vec<VisitGroup<'_>> {
    let mut groups: Vec<VisitGroup<'_>> = Vec::new();
    for reading in readings {
        match groups.last_mut() {
            Some(current) if current.clean_location() == reading.location_text_clean => {
                current.extend(reading);
            }
            _ => groups.push(VisitGroup::start(reading)),
        }
    }
    groups
}
