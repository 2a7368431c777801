//! External service integrations.

pub mod geocoder;

pub use geocoder::{build_geocoder, NominatimGeocoder};
