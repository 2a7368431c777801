//! Marks devices inactive once they stop reporting.
//!
//! Reactivation happens on ingestion: recording a sighting sets
//! `is_active` back to true.

use chrono::Utc;
use persistence::repositories::DeviceRepository;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

pub struct DeviceActivityJob {
    devices: DeviceRepository,
    inactive_after_hours: u32,
}

impl DeviceActivityJob {
    pub fn new(devices: DeviceRepository, inactive_after_hours: u32) -> Self {
        Self {
            devices,
            inactive_after_hours,
        }
    }
}

#[async_trait::async_trait]
impl Job for DeviceActivityJob {
    fn name(&self) -> &'static str {
        "device_activity"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(15)
    }

    async fn execute(&self) -> Result<(), String> {
        let cutoff = Utc::now() - chrono::Duration::hours(i64::from(self.inactive_after_hours));
        let marked = self
            .devices
            .mark_inactive_since(cutoff)
            .await
            .map_err(|e| format!("Failed to mark inactive devices: {}", e))?;

        if marked > 0 {
            info!(
                marked,
                inactive_after_hours = self.inactive_after_hours,
                "Marked silent devices inactive"
            );
        }

        Ok(())
    }
}
