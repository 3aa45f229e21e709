//! HTTP autonomous-agent client
//!
//! Starts an agent run with
//! `POST {base_url}/agents/{agent_id}/agentAliases/{alias_id}/sessions/{session_id}/text`
//! and forwards the streamed response body to the caller chunk by chunk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_authorization::{AgentInvocation, AgentService, AgentStream};

use crate::circuit_breaker::{guarded, CircuitBreaker};
use crate::config::AgentClientConfig;
use crate::http;

const SERVICE: &str = "agent-runtime";

/// Autonomous agent runtime reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    config: AgentClientConfig,
    client: Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl HttpAgentClient {
    pub fn new(config: AgentClientConfig) -> Result<Self, PortError> {
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

    pub fn endpoint(&self, invocation: &AgentInvocation) -> String {
        format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.config.base_url.trim_end_matches('/'),
            invocation.agent_id,
            invocation.alias_id,
            invocation.session_id
        )
    }

    async fn start(&self, invocation: &AgentInvocation) -> Result<Response, PortError> {
        let mut request = self
            .client
            .post(self.endpoint(invocation))
            .json(&json!({ "inputText": invocation.input_text }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        http::send(request, SERVICE, Duration::from_secs(self.config.timeout_secs)).await
    }
}

/// Incremental UTF-8 decoding across chunk boundaries
#[derive(Debug, Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    /// Appends bytes and returns the longest decodable prefix
    fn push(&mut self, bytes: &[u8]) -> Result<String, PortError> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_owned();
                self.pending.clear();
                Ok(text)
            }
            // An incomplete sequence at the end is kept for the next chunk
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let rest = self.pending.split_off(valid);
                let text = String::from_utf8(std::mem::replace(&mut self.pending, rest))
                    .map_err(|e| PortError::transformation(e.to_string()))?;
                Ok(text)
            }
            Err(e) => Err(PortError::transformation(format!("agent stream is not UTF-8: {e}"))),
        }
    }

    fn finish(self) -> Result<(), PortError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(PortError::transformation("agent stream ended inside a UTF-8 sequence"))
        }
    }
}

async fn forward(mut response: Response, tx: mpsc::Sender<Result<String, PortError>>, timeout: Duration) {
    let mut decoder = Utf8Chunks::default();
    loop {
        let item = match response.chunk().await {
            Ok(Some(bytes)) => decoder.push(&bytes),
            Ok(None) => break,
            Err(e) => Err(http::transport_error(e, SERVICE, timeout)),
        };
        let failed = item.is_err();
        if let Ok(text) = &item {
            if text.is_empty() {
                continue;
            }
        }
        if tx.send(item).await.is_err() {
            debug!("Agent stream receiver dropped");
            return;
        }
        if failed {
            return;
        }
    }
    if let Err(e) = decoder.finish() {
        warn!(error = %e, "Agent stream truncated");
        let _ = tx.send(Err(e)).await;
    }
}

impl DomainPort for HttpAgentClient {}

#[async_trait]
impl HealthCheckable for HttpAgentClient {
    async fn health_check(&self) -> HealthCheckResult {
        match &self.circuit_breaker {
            Some(cb) if cb.is_open() => HealthCheckResult::new(SERVICE, AdapterHealth::Degraded, 0)
                .with_message("Circuit breaker is open"),
            _ => HealthCheckResult::new(SERVICE, AdapterHealth::Unknown, 0),
        }
    }
}

#[async_trait]
impl AgentService for HttpAgentClient {
    #[instrument(skip(self, invocation), fields(agent_id = %invocation.agent_id, session_id = %invocation.session_id))]
    async fn invoke(&self, invocation: AgentInvocation) -> Result<AgentStream, PortError> {
        let response = guarded(self.circuit_breaker.as_deref(), self.start(&invocation)).await?;

        let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
        tokio::spawn(forward(response, tx, Duration::from_secs(self.config.timeout_secs)));
        Ok(rx)
    }
}
