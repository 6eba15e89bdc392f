use serde::Deserialize;

/// Main configuration for the catalog viewer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listen address of the viewer
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Catalog API the viewer reads from
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Full URL of the query endpoint
    #[serde(default = "default_catalog_url")]
    pub url: String,
}

fn default_service_name() -> String {
    "catalog-viewer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8501
}

fn default_catalog_url() -> String {
    "http://localhost:7071/funcGetDatabase".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/viewer").required(false))
            .add_source(config::File::with_name("/etc/dioflix/viewer").required(false))
            // VIEWER__CATALOG__URL -> catalog.url
            .add_source(
                config::Environment::with_prefix("VIEWER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.catalog.url, "http://localhost:7071/funcGetDatabase");
        assert_eq!(config.api.port, 8501);
        assert_eq!(config.service.name, "catalog-viewer");
    }
}
