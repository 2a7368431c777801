//! Retention job for location history and the geocode cache.

use chrono::Utc;
use persistence::repositories::{GeocodeCacheRepository, LocationRepository};
use tracing::info;

use super::scheduler::{Job, JobFrequency};

const BATCH_SIZE: i64 = 10_000;

/// Deletes readings older than the retention window, then stale geocode
/// cache entries.
pub struct CleanupLocationsJob {
    locations: LocationRepository,
    geocode_cache: GeocodeCacheRepository,
    retention_days: u32,
    cache_ttl_days: u32,
}

impl CleanupLocationsJob {
    /// A `retention_days` of 0 keeps readings forever; the cache is still purged.
    pub fn new(
        locations: LocationRepository,
        geocode_cache: GeocodeCacheRepository,
        retention_days: u32,
        cache_ttl_days: u32,
    ) -> Self {
        Self {
            locations,
            geocode_cache,
            retention_days,
            cache_ttl_days,
        }
    }

    fn retention_enabled(&self) -> bool {
        self.retention_days > 0
    }
}

#[async_trait::async_trait]
impl Job for CleanupLocationsJob {
    fn name(&self) -> &'static str {
        "cleanup_locations"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();

        if self.retention_enabled() {
            let cutoff = now - chrono::Duration::days(i64::from(self.retention_days));
            let deleted = self
                .locations
                .delete_older_than(cutoff, BATCH_SIZE)
                .await
                .map_err(|e| format!("Failed to delete old readings: {}", e))?;

            info!(
                deleted,
                retention_days = self.retention_days,
                "Cleaned up old readings"
            );
        }

        let cache_cutoff = now - chrono::Duration::days(i64::from(self.cache_ttl_days));
        let purged = self
            .geocode_cache
            .delete_older_than(cache_cutoff)
            .await
            .map_err(|e| format!("Failed to purge geocode cache: {}", e))?;

        if purged > 0 {
            info!(purged, "Purged stale geocode cache entries");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn job(retention_days: u32) -> CleanupLocationsJob {
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        CleanupLocationsJob::new(
            LocationRepository::new(pool.clone()),
            GeocodeCacheRepository::new(pool),
            retention_days,
            7,
        )
    }

    #[tokio::test]
    async fn test_zero_retention_disables_reading_cleanup() {
        assert!(!job(0).retention_enabled());
        assert!(job(30).retention_enabled());
    }

    #[tokio::test]
    async fn test_job_metadata() {
        let job = job(30);
        assert_eq!(job.name(), "cleanup_locations");
        assert_eq!(job.frequency(), JobFrequency::Hourly);
    }
}
