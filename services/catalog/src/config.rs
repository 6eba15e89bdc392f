use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the catalog service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Document database configuration
    pub database: DatabaseConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Largest request body accepted by the upload route
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Object storage configuration.
///
/// Credentials come from the standard AWS provider chain.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Region of the storage service
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Base URL used when building locators, overrides the endpoint
    pub public_base_url: Option<String>,
    /// Container (bucket) receiving video uploads
    #[serde(default = "default_video_container")]
    pub video_container: String,
    /// Container (bucket) receiving image uploads
    #[serde(default = "default_image_container")]
    pub image_container: String,
    /// Multipart upload threshold in bytes
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
}

/// Document database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub endpoint: String,
    /// Password, applied on top of the endpoint URL when set
    pub key: Option<String>,
    /// Database name (a schema in PostgreSQL)
    pub name: String,
    /// Container name (a table inside the database schema)
    pub container: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

// Default value functions
fn default_service_name() -> String {
    "catalog-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    7071
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024 // 100MB
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_video_container() -> String {
    "videos".to_string()
}

fn default_image_container() -> String {
    "images".to_string()
}

fn default_multipart_threshold() -> usize {
    8 * 1024 * 1024 // 8MB
}

fn default_part_size() -> usize {
    8 * 1024 * 1024 // 8MB
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/catalog").required(false))
            .add_source(config::File::with_name("/etc/dioflix/catalog").required(false))
            // Override with environment variables
            // CATALOG__DATABASE__ENDPOINT -> database.endpoint
            .add_source(
                config::Environment::with_prefix("CATALOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the stores cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_identifier("database.name", &self.database.name)?;
        validate_identifier("database.container", &self.database.container)?;

        // S3 rejects multipart parts below 5MB except the last one
        if self.storage.part_size_bytes < 5 * 1024 * 1024 {
            anyhow::bail!("storage.part_size_bytes must be at least 5MB");
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Pool acquire timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Idle connection timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Database and container names end up as quoted SQL identifiers.
fn validate_identifier(key: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        anyhow::bail!("{key} must not be empty");
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        anyhow::bail!("{key} may only contain ASCII letters, digits, '_' and '-': {value:?}");
    }
    Ok(())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            public_base_url: None,
            video_container: default_video_container(),
            image_container: default_image_container(),
            multipart_threshold_bytes: default_multipart_threshold(),
            part_size_bytes: default_part_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(name: &str, container: &str) -> DatabaseConfig {
        DatabaseConfig {
            endpoint: "postgres://localhost/dioflix".to_string(),
            key: None,
            name: name.to_string(),
            container: container.to_string(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }

    fn config_with(database: DatabaseConfig) -> Config {
        Config {
            service: ServiceConfig::default(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            database,
        }
    }

    #[test]
    fn test_default_values() {
        let storage = StorageConfig::default();
        assert_eq!(storage.video_container, "videos");
        assert_eq!(storage.image_container, "images");
        assert_eq!(default_api_port(), 7071);
        assert_eq!(default_max_upload_bytes(), 104_857_600);
    }

    #[test]
    fn test_validate_accepts_plain_names() {
        let config = config_with(database("dioflix-db", "movies_v2"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_quotes_and_empty() {
        assert!(config_with(database("db\"; DROP", "movies")).validate().is_err());
        assert!(config_with(database("db", "")).validate().is_err());
        assert!(config_with(database("my db", "movies")).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_small_parts() {
        let mut config = config_with(database("db", "movies"));
        config.storage.part_size_bytes = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let mut database = database("db", "movies");
        assert_eq!(database.connect_timeout(), Duration::from_secs(30));
        assert_eq!(database.idle_timeout(), Duration::from_secs(600));

        database.connect_timeout_secs = 5;
        assert_eq!(database.connect_timeout(), Duration::from_secs(5));
    }
}
