//! Adapter configuration
//!
//! Each adapter takes its own section; every field has a default so partial
//! configuration from the environment is enough.

use serde::Deserialize;

use core_kernel::CircuitBreakerConfig;

/// Settings for the diagnosis-code reference
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeReferenceConfig {
    /// ICD-10-CM search endpoint
    pub base_url: String,
    pub timeout_secs: u64,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for CodeReferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://clinicaltables.nlm.nih.gov/api/icd10cm/v3/search".to_string(),
            timeout_secs: 5,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Settings for the reasoning endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasoningClientConfig {
    /// Base URL of the model runtime; requests go to `{base_url}/model/{model_id}/...`
    pub base_url: String,
    pub model_id: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for ReasoningClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            model_id: "amazon.nova-pro-v1:0".to_string(),
            api_key: None,
            timeout_secs: 60,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Settings for the autonomous agent runtime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Capacity of the chunk channel handed to the caller
    pub stream_buffer: usize,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8082".to_string(),
            api_key: None,
            timeout_secs: 300,
            stream_buffer: 32,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Settings for the filesystem evidence store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    /// Directory that evidence paths are resolved against
    pub root: String,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            root: "./data".to_string(),
        }
    }
}
