//! Repository implementations for database operations.

pub mod device;
pub mod geocode_cache;
pub mod location;

pub use device::DeviceRepository;
pub use geocode_cache::GeocodeCacheRepository;
pub use location::LocationRepository;
