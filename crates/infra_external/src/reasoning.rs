//! HTTP reasoning client
//!
//! Posts a single-turn prompt to `{base_url}/model/{model_id}/{action}` and
//! extracts the model text from the response. The request and response
//! shapes come from the configured [`EnvelopeFormat`]; the client itself
//! never inspects the model identifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_authorization::{CompletionParams, EnvelopeFormat, ReasoningService};

use crate::circuit_breaker::{guarded, CircuitBreaker};
use crate::config::ReasoningClientConfig;
use crate::http;

const SERVICE: &str = "reasoning-service";

/// Reasoning service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpReasoningClient {
    config: ReasoningClientConfig,
    format: EnvelopeFormat,
    client: Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl HttpReasoningClient {
    pub fn new(config: ReasoningClientConfig, format: EnvelopeFormat) -> Result<Self, PortError> {
        let client = http::build_client(Duration::from_secs(config.timeout_secs))?;
        let circuit_breaker = config
            .circuit_breaker
            .clone()
            .map(|cb| Arc::new(CircuitBreaker::new(SERVICE, cb)));
        Ok(Self {
            config,
            format,
            client,
            circuit_breaker,
        })
    }

    /// Endpoint for the configured model and envelope
    pub fn endpoint(&self) -> String {
        let action = match self.format {
            EnvelopeFormat::Messages => "invoke",
            EnvelopeFormat::Converse => "converse",
        };
        format!(
            "{}/model/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_id,
            action
        )
    }

    async fn post(&self, body: &Value) -> Result<Value, PortError> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = http::send(request, SERVICE, Duration::from_secs(self.config.timeout_secs)).await?;
        http::read_json(response, SERVICE).await
    }
}

impl DomainPort for HttpReasoningClient {}

#[async_trait]
impl HealthCheckable for HttpReasoningClient {
    /// Reports circuit state only; a probe completion would cost tokens
    async fn health_check(&self) -> HealthCheckResult {
        match &self.circuit_breaker {
            Some(cb) if cb.is_open() => HealthCheckResult::new(SERVICE, AdapterHealth::Degraded, 0)
                .with_message("Circuit breaker is open"),
            _ => HealthCheckResult::new(SERVICE, AdapterHealth::Unknown, 0),
        }
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningClient {
    #[instrument(skip(self, prompt), fields(model = %self.config.model_id, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, PortError> {
        let envelope = self.format.envelope();
        let body = envelope.request_body(prompt, params);

        let response = guarded(self.circuit_breaker.as_deref(), self.post(&body)).await?;
        let text = envelope.extract_text(&response)?;
        debug!(response_len = text.len(), "Completion received");
        Ok(text)
    }
}
