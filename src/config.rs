use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Legacy environment variables honoured on top of the `LOGVAULT__` prefix.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ELASTICSEARCH_URL", "elasticsearch.url"),
    ("ELASTICSEARCH_CLOUD_ID", "elasticsearch.cloud_id"),
    ("ELASTICSEARCH_API_KEY", "elasticsearch.api_key"),
    ("ELASTICSEARCH_USERNAME", "elasticsearch.username"),
    ("ELASTICSEARCH_PASSWORD", "elasticsearch.password"),
    ("AUTH_SERVICE_URL", "auth.service_url"),
    ("ENVIRONMENT", "deployment.environment"),
    ("PORT", "server.port"),
];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Deployment configuration
    #[serde(default)]
    pub deployment: DeploymentConfig,

    /// Log store backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Elasticsearch connection
    pub elasticsearch: ElasticsearchConfig,

    /// External auth service
    pub auth: AuthConfig,

    /// Ingestion limits
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Search paging limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/logvault.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layering `config_path` (optional) and environment over the defaults
    pub fn load_from(config_path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: LOGVAULT__)
            .add_source(
                config::Environment::with_prefix("LOGVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults only, ignoring files and environment
    pub fn defaults() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.search.max_page_size == 0 {
            return Err(AppError::Configuration(
                "search.max_page_size must be at least 1".to_string(),
            ));
        }
        if self.search.default_page_size == 0
            || self.search.default_page_size > self.search.max_page_size
        {
            return Err(AppError::Configuration(format!(
                "search.default_page_size must be between 1 and {}",
                self.search.max_page_size
            )));
        }
        if self.storage.backend == StorageBackend::Elasticsearch {
            self.elasticsearch.endpoint()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeploymentConfig {
    /// Deployment target reported by `/health`
    #[serde(default)]
    pub environment: Environment,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Elasticsearch,
    /// In-process store, contents are lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Cluster URL, ignored when `cloud_id` is set
    pub url: Option<String>,

    /// Elastic Cloud deployment locator
    pub cloud_id: Option<String>,

    /// API key, preferred over basic credentials
    pub api_key: Option<String>,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Target index
    #[serde(default = "default_index")]
    pub index: String,
}

/// How requests to Elasticsearch authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElasticsearchCredentials {
    ApiKey(String),
    Basic { username: String, password: Option<String> },
    None,
}

impl ElasticsearchConfig {
    /// Resolve the base URL, decoding `cloud_id` when present
    pub fn endpoint(&self) -> Result<String> {
        if let Some(cloud_id) = self.cloud_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return decode_cloud_id(cloud_id);
        }

        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                AppError::Configuration(
                    "Elasticsearch backend requires 'elasticsearch.url' or 'elasticsearch.cloud_id'"
                        .to_string(),
                )
            })
    }

    pub fn credentials(&self) -> ElasticsearchCredentials {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return ElasticsearchCredentials::ApiKey(key.clone());
        }
        match self.username.as_ref().filter(|u| !u.is_empty()) {
            Some(username) => ElasticsearchCredentials::Basic {
                username: username.clone(),
                password: self.password.clone(),
            },
            None => ElasticsearchCredentials::None,
        }
    }
}

/// Decode an Elastic Cloud id of the form `name:base64(host$es_uuid$kibana_uuid)`.
fn decode_cloud_id(cloud_id: &str) -> Result<String> {
    let encoded = cloud_id
        .split_once(':')
        .map(|(_, encoded)| encoded)
        .unwrap_or(cloud_id);

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(encoded))
        .map_err(|e| AppError::Configuration(format!("Invalid Elasticsearch cloud id: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| AppError::Configuration(format!("Invalid Elasticsearch cloud id: {}", e)))?;

    let mut parts = decoded.split('$');
    match (parts.next(), parts.next()) {
        (Some(host), Some(es_uuid)) if !host.is_empty() && !es_uuid.is_empty() => {
            Ok(format!("https://{}.{}", es_uuid, host))
        }
        _ => Err(AppError::Configuration(
            "Invalid Elasticsearch cloud id: missing host or cluster id".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL; keys are checked with `GET {service_url}/validate`
    pub service_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Entries carrying this source are attributed to the authenticated source
    #[serde(default = "default_placeholder_source")]
    pub placeholder_source: String,

    /// Largest accepted batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            placeholder_source: default_placeholder_source(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Requests above this limit are rejected, not clamped
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_index() -> String {
    "logs".to_string()
}

fn default_placeholder_source() -> String {
    "default".to_string()
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn es_config() -> ElasticsearchConfig {
        ElasticsearchConfig {
            url: Some("http://localhost:9200/".to_string()),
            cloud_id: None,
            api_key: None,
            username: None,
            password: None,
            index: default_index(),
        }
    }

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_port(), 8000);
        assert_eq!(default_index(), "logs");
        assert_eq!(default_max_page_size(), 100);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config = Config::defaults().unwrap();

        assert_eq!(config.elasticsearch.index, "logs");
        assert_eq!(config.deployment.environment, Environment::Development);
        assert_eq!(config.storage.backend, StorageBackend::Elasticsearch);
        assert_eq!(config.search.max_page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(es_config().endpoint().unwrap(), "http://localhost:9200");
    }

    #[test]
    fn test_endpoint_requires_url_or_cloud_id() {
        let config = ElasticsearchConfig {
            url: None,
            ..es_config()
        };
        assert!(matches!(config.endpoint(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_cloud_id_takes_precedence() {
        let encoded = general_purpose::STANDARD.encode("us-east-1.aws.found.io$abc123$kib456");
        let config = ElasticsearchConfig {
            cloud_id: Some(format!("my-deployment:{}", encoded)),
            ..es_config()
        };
        assert_eq!(
            config.endpoint().unwrap(),
            "https://abc123.us-east-1.aws.found.io"
        );
    }

    #[test]
    fn test_invalid_cloud_id() {
        let config = ElasticsearchConfig {
            cloud_id: Some("deployment:not-base64!".to_string()),
            ..es_config()
        };
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn test_credentials_prefer_api_key() {
        let config = ElasticsearchConfig {
            api_key: Some("secret".to_string()),
            username: Some("elastic".to_string()),
            ..es_config()
        };
        assert_eq!(
            config.credentials(),
            ElasticsearchCredentials::ApiKey("secret".to_string())
        );

        let config = ElasticsearchConfig {
            username: Some("elastic".to_string()),
            password: Some("changeme".to_string()),
            ..es_config()
        };
        assert_eq!(
            config.credentials(),
            ElasticsearchCredentials::Basic {
                username: "elastic".to_string(),
                password: Some("changeme".to_string()),
            }
        );

        assert_eq!(es_config().credentials(), ElasticsearchCredentials::None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[storage]\nbackend = \"memory\"\n\n[search]\ndefault_page_size = 10\nmax_page_size = 50"
        )
        .unwrap();

        let config = Config::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.search.default_page_size, 10);
        assert_eq!(config.search.max_page_size, 50);
        assert_eq!(config.ingestion.max_batch_size, 1000);
    }

    #[test]
    fn test_missing_file_is_optional() {
        let config = Config::load_from("/nonexistent/logvault.toml").unwrap();
        assert_eq!(config.server.port, 8000);
    }
}
