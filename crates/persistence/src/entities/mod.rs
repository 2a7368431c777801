//! Database entity definitions.

pub mod device;
pub mod geocode_cache;
pub mod location;

pub use device::{DeviceEntity, DeviceSummaryEntity, InactiveDeviceEntity, UpsertedDeviceEntity};
pub use geocode_cache::GeocodeCacheEntity;
pub use location::{
    DeviceStatsEntity, LocationEntity, LocationFrequencyEntity, LocationWithDeviceEntity,
};
