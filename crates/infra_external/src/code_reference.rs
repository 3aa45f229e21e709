//! NIH Clinical Tables code reference
//!
//! The ICD-10-CM search API answers `?sf=code&terms=<code>` with a JSON array:
//! `[total, [codes...], extra, [[code, name]...]]`. A code is valid when it
//! appears verbatim among the returned codes; prefix matches alone do not
//! count.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_authorization::{CodeLookup, CodeReference};

use crate::circuit_breaker::{guarded, CircuitBreaker};
use crate::config::CodeReferenceConfig;
use crate::http;

const SERVICE: &str = "clinical-tables";
const SOURCE: &str = "NIH Clinical Tables";

/// ICD-10-CM lookup client
#[derive(Debug, Clone)]
pub struct ClinicalTablesClient {
    config: CodeReferenceConfig,
    client: Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl ClinicalTablesClient {
    pub fn new(config: CodeReferenceConfig) -> Result<Self, PortError> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs))?;
        let circuit_breaker = config
            .circuit_breaker
            .clone()
            .map(|cb| Arc::new(CircuitBreaker::new(SERVICE, cb)));
        Ok(Self {
            config,
            client,
            circuit_breaker,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn search(&self, code: &str) -> Result<Value, PortError> {
        let request = self
            .client
            .get(&self.config.base_url)
            .query(&[("sf", "code"), ("terms", code)]);
        let response = http::send(request, SERVICE, self.timeout()).await?;
        http::read_json(response, SERVICE).await
    }
}

/// Finds `code` in a search result and returns its display name
fn exact_match(result: &Value, code: &str) -> Result<Option<Option<String>>, PortError> {
    let rows = result
        .as_array()
        .ok_or_else(|| PortError::transformation("search result is not an array"))?;
    let codes = rows
        .get(1)
        .and_then(Value::as_array)
        .ok_or_else(|| PortError::transformation("search result has no code list"))?;

    let Some(index) = codes
        .iter()
        .position(|c| c.as_str().is_some_and(|c| c.eq_ignore_ascii_case(code)))
    else {
        return Ok(None);
    };

    let description = rows
        .get(3)
        .and_then(|display| display.get(index))
        .and_then(|row| match row {
            Value::Array(fields) => fields.last().and_then(Value::as_str),
            Value::String(name) => Some(name.as_str()),
            _ => None,
        })
        .map(str::to_owned);
    Ok(Some(description))
}

impl DomainPort for ClinicalTablesClient {}

#[async_trait]
impl HealthCheckable for ClinicalTablesClient {
    async fn health_check(&self) -> HealthCheckResult {
        if let Some(cb) = &self.circuit_breaker {
            if cb.is_open() {
                return HealthCheckResult::new(SERVICE, AdapterHealth::Degraded, 0)
                    .with_message("Circuit breaker is open");
            }
        }

        let start = std::time::Instant::now();
        let result = self.search("A00").await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::new(SERVICE, AdapterHealth::Healthy, latency_ms),
            Err(e) => HealthCheckResult::new(SERVICE, AdapterHealth::Unhealthy, latency_ms)
                .with_message(e.to_string()),
        }
    }
}

#[async_trait]
impl CodeReference for ClinicalTablesClient {
    #[instrument(skip(self))]
    async fn lookup(&self, code: &str) -> Result<CodeLookup, PortError> {
        // Absent codes come back as an empty result, so a 404 means the
        // endpoint itself is wrong
        let result = guarded(self.circuit_breaker.as_deref(), self.search(code))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PortError::unavailable(format!("{SERVICE} endpoint not found"))
                } else {
                    e
                }
            })?;

        let lookup = match exact_match(&result, code)? {
            Some(description) => CodeLookup {
                valid: true,
                description,
                source: SOURCE.to_string(),
            },
            None => CodeLookup {
                valid: false,
                description: None,
                source: SOURCE.to_string(),
            },
        };
        debug!(valid = lookup.valid, "Code lookup complete");
        Ok(lookup)
    }
}
