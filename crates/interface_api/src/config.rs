//! Server configuration
//!
//! Loaded from environment variables prefixed with `PA_`; nested keys are
//! separated by `__`, e.g. `PA_DATABASE__URL` or
//! `PA_ADJUDICATION__AUTONOMOUS__ENABLED`. Every value has a default.

use serde::Deserialize;

use domain_authorization::AdjudicationConfig;
use infra_db::DatabaseConfig;
use infra_external::{AgentClientConfig, BlobStoreConfig, CodeReferenceConfig, ReasoningClientConfig};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
    pub database: DatabaseConfig,
    pub adjudication: AdjudicationConfig,
    pub code_reference: CodeReferenceConfig,
    /// Reasoning endpoint; without it every decision uses the fallback rules
    pub reasoning: Option<ReasoningClientConfig>,
    /// Autonomous agent runtime; only consulted when delegation is enabled
    pub agent: Option<AgentClientConfig>,
    pub blobs: BlobStoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            database: DatabaseConfig::default(),
            adjudication: AdjudicationConfig::default(),
            code_reference: CodeReferenceConfig::default(),
            reasoning: None,
            agent: None,
            blobs: BlobStoreConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("PA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
