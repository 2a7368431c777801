//! Background job scheduler and job implementations.

mod cleanup_locations;
mod device_activity;
mod pool_metrics;
mod scheduler;

pub use cleanup_locations::CleanupLocationsJob;
pub use device_activity::DeviceActivityJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
