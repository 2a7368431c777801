use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub use persistence::db::DatabaseConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// A place name with fixed coordinates, checked before the upstream geocoder.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Nominatim-compatible search endpoint
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,

    #[serde(default = "default_geocoding_user_agent")]
    pub user_agent: String,

    /// Deadline for a single upstream attempt
    #[serde(default = "default_geocoding_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between upstream requests
    #[serde(default = "default_geocoding_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_geocoding_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_geocoding_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How long cached lookups (hits and misses) stay fresh
    #[serde(default = "default_geocoding_cache_ttl_days")]
    pub cache_ttl_days: u32,

    #[serde(default)]
    pub custom_locations: Vec<CustomLocation>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_geocoding_base_url(),
            user_agent: default_geocoding_user_agent(),
            timeout_ms: default_geocoding_timeout_ms(),
            min_interval_ms: default_geocoding_min_interval_ms(),
            max_retries: default_geocoding_max_retries(),
            retry_backoff_ms: default_geocoding_retry_backoff_ms(),
            cache_ttl_days: default_geocoding_cache_ttl_days(),
            custom_locations: Vec::new(),
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Upper bound for one whole lookup: every attempt plus the linear backoff between them.
    pub fn deadline(&self) -> Duration {
        let attempts = self.max_retries + 1;
        let backoff_steps = self.max_retries * (self.max_retries + 1) / 2;
        self.timeout() * attempts + self.retry_backoff() * backoff_steps
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Minimum similarity (0..=100) for a raw name to resolve to a known device
    #[serde(default = "default_match_threshold")]
    pub match_threshold: u8,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_storage_retries")]
    pub storage_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            max_batch_size: default_max_batch_size(),
            max_concurrency: default_max_concurrency(),
            storage_retries: default_storage_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_inactive_after_hours")]
    pub inactive_after_hours: u32,

    /// Readings older than this are purged. 0, the default, keeps everything.
    #[serde(default = "default_location_retention_days")]
    pub location_retention_days: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            inactive_after_hours: default_inactive_after_hours(),
            location_retention_days: default_location_retention_days(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_true() -> bool {
    true
}
fn default_geocoding_base_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}
fn default_geocoding_user_agent() -> String {
    "airtag-tracker/0.1".to_string()
}
fn default_geocoding_timeout_ms() -> u64 {
    4_500
}
fn default_geocoding_min_interval_ms() -> u64 {
    1_000
}
fn default_geocoding_max_retries() -> u32 {
    1
}
fn default_geocoding_retry_backoff_ms() -> u64 {
    1_000
}
fn default_geocoding_cache_ttl_days() -> u32 {
    7
}
fn default_match_threshold() -> u8 {
    domain::services::fuzzy_matcher::DEFAULT_MATCH_THRESHOLD
}
fn default_max_batch_size() -> usize {
    100
}
fn default_max_concurrency() -> usize {
    4
}
fn default_storage_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    200
}
fn default_inactive_after_hours() -> u32 {
    24
}
fn default_location_retention_days() -> u32 {
    0
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with AT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("AT").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on the working directory.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 5
            min_connections = 1

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []

            [geocoding]
            enabled = false

            [ingestion]
            match_threshold = 80
            max_batch_size = 100
            max_concurrency = 4
            storage_retries = 3
            retry_backoff_ms = 10

            [jobs]
            inactive_after_hours = 24
            location_retention_days = 0
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "AT__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.ingestion.match_threshold > 100 {
            return Err(ConfigValidationError::InvalidValue(
                "ingestion.match_threshold must be between 0 and 100".to_string(),
            ));
        }

        if self.ingestion.max_batch_size == 0 || self.ingestion.max_concurrency == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "ingestion.max_batch_size and ingestion.max_concurrency must be positive"
                    .to_string(),
            ));
        }

        if self.geocoding.enabled {
            if self.geocoding.base_url.is_empty() {
                return Err(ConfigValidationError::MissingRequired(
                    "geocoding.base_url must be set when geocoding is enabled".to_string(),
                ));
            }
            // Public Nominatim allows at most one request per second.
            if self.geocoding.min_interval_ms < 1_000 {
                return Err(ConfigValidationError::InvalidValue(
                    "geocoding.min_interval_ms must be at least 1000".to_string(),
                ));
            }
        }

        if self.jobs.inactive_after_hours == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "jobs.inactive_after_hours must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
