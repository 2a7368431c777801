//! Domain models for the AirTag tracker.

pub mod device;
pub mod ingest;
pub mod location;
pub mod stats;
pub mod visit;

pub use device::{Device, DeviceSummary, NewDevice};
pub use ingest::{IngestOutcome, IngestStatus};
pub use location::{Coordinates, LocationReading, NewLocationReading, RawReading};
pub use stats::{DeviceStats, StatsPeriod};
pub use visit::{VisitGroup, VisitGroupView};
