use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::errors::GeocodeError;
use domain::services::{
    DeviceResolver, FuzzyDeviceMatcher, Geocoder, IngestionSettings, ReadingIngestionPipeline,
};
use persistence::repositories::{DeviceRepository, GeocodeCacheRepository, LocationRepository};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, security_headers_middleware, trace_id,
};
use crate::routes::{devices, health, ingest, locations};
use crate::services::build_geocoder;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub devices: DeviceRepository,
    pub locations: LocationRepository,
    pub pipeline: Arc<ReadingIngestionPipeline>,
}

impl AppState {
    /// Wires repositories and the ingestion pipeline with the configured geocoder.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, GeocodeError> {
        let geocoder = build_geocoder(&config.geocoding, GeocodeCacheRepository::new(pool.clone()))?;
        Ok(Self::with_geocoder(config, pool, geocoder))
    }

    pub fn with_geocoder(config: Config, pool: PgPool, geocoder: Arc<dyn Geocoder>) -> Self {
        let devices = DeviceRepository::new(pool.clone());
        let locations = LocationRepository::new(pool.clone());

        let resolver = DeviceResolver::new(
            Arc::new(devices.clone()),
            FuzzyDeviceMatcher::new(config.ingestion.match_threshold),
        );
        let settings = IngestionSettings {
            geocode_timeout: config.geocoding.deadline(),
            storage_retries: config.ingestion.storage_retries,
            retry_backoff: Duration::from_millis(config.ingestion.retry_backoff_ms),
            max_concurrency: config.ingestion.max_concurrency,
        };
        let pipeline = ReadingIngestionPipeline::new(
            resolver,
            Arc::new(locations.clone()),
            geocoder,
            settings,
        );

        Self {
            pool,
            config: Arc::new(config),
            devices,
            locations,
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        .route("/api/v1/devices", get(devices::list_devices))
        .route("/api/v1/devices/inactive", get(devices::list_inactive_devices))
        // GET takes a device name, DELETE a numeric id; axum needs one parameter name.
        .route(
            "/api/v1/devices/:device",
            get(devices::get_device).delete(devices::delete_device),
        )
        .route(
            "/api/v1/devices/:device/history",
            get(devices::get_device_history),
        )
        .route(
            "/api/v1/devices/:device/timeline",
            get(devices::get_device_timeline),
        )
        .route("/api/v1/devices/:device/stats", get(devices::get_device_stats))
        .route("/api/v1/locations", get(locations::list_recent_locations))
        .route("/api/v1/locations/search", get(locations::search_locations))
        .route("/api/v1/locations/:id", delete(locations::delete_location))
        .route("/api/v1/ingest", post(ingest::ingest_readings));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(api_routes)
        .merge(public_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
