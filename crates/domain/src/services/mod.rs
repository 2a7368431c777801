//! Domain services for the AirTag tracker.
//!
//! The pure helpers (normalization, matching, grouping, distances) have no
//! I/O. The resolver and the ingestion pipeline talk to storage and the
//! geocoder only through the traits defined here.

pub mod device_resolver;
pub mod distance;
pub mod fuzzy_matcher;
pub mod geocoding;
pub mod ingestion;
pub mod text_normalizer;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use device_resolver::{DeviceResolver, DeviceStore, RegistrySnapshot, Resolution};
pub use distance::{format_distance, haversine_meters};
pub use fuzzy_matcher::{FuzzyDeviceMatcher, NameMatch, OcrTolerantSimilarity, Similarity};
pub use geocoding::{BoundedGeocoder, Geocoder, NoopGeocoder};
pub use ingestion::{IngestionSettings, ReadingIngestionPipeline, ReadingStore};
pub use text_normalizer::{normalize, parse_distance_meters, LOCATION_NOT_AVAILABLE};
pub use timeline::group_visits;
