use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use airtag_tracker_api::app::{self, AppState};
use airtag_tracker_api::config::Config;
use airtag_tracker_api::jobs::{
    CleanupLocationsJob, DeviceActivityJob, JobScheduler, PoolMetricsJob,
};
use airtag_tracker_api::middleware;
use persistence::repositories::{DeviceRepository, GeocodeCacheRepository, LocationRepository};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting AirTag Tracker API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let mut scheduler = JobScheduler::new();
    scheduler.register(DeviceActivityJob::new(
        DeviceRepository::new(pool.clone()),
        config.jobs.inactive_after_hours,
    ));
    scheduler.register(CleanupLocationsJob::new(
        LocationRepository::new(pool.clone()),
        GeocodeCacheRepository::new(pool.clone()),
        config.jobs.location_retention_days,
        config.geocoding.cache_ttl_days,
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    let addr = config.socket_addr().context("Invalid server address")?;
    let state = AppState::new(config, pool).context("Failed to build geocoder")?;
    let app = app::create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
