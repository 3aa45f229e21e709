//! HTTP adapter tests against an in-process server

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use core_kernel::{CircuitBreakerConfig, PortError};
use domain_authorization::{
    AgentInvocation, AgentServiceExt, CodeReference, CompletionParams, EnvelopeFormat, ReasoningConfig,
    ReasoningService, ValidationStep,
};
use infra_external::{
    AgentClientConfig, ClinicalTablesClient, CodeReferenceConfig, HttpAgentClient, HttpReasoningClient,
    ReasoningClientConfig,
};

async fn icd10(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    match params.get("terms").map(String::as_str) {
        Some("M25.561") => Json(json!([1, ["M25.561"], null, [["M25.561", "Pain in right knee"]]])),
        _ => Json(json!([0, [], null, []])),
    }
}

async fn invoke(Path(model): Path<String>, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    match model.as_str() {
        "down" => Err(StatusCode::SERVICE_UNAVAILABLE),
        "throttled" => Err(StatusCode::TOO_MANY_REQUESTS),
        _ => {
            let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
            Ok(Json(json!({
                "content": [{"type": "text", "text": format!("```json\n{{\"echo\": \"{prompt}\"}}\n```")}]
            })))
        }
    }
}

async fn converse(Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["messages"][0]["content"][0]["text"].as_str().unwrap_or_default();
    Json(json!({"output": {"message": {"content": [{"text": format!("converse:{prompt}")}]}}}))
}

async fn agent(Path((agent_id, _alias, session)): Path<(String, String, String)>, Json(body): Json<Value>) -> Result<String, StatusCode> {
    if agent_id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(format!(
        "{session}: processed '{}'",
        body["inputText"].as_str().unwrap_or_default()
    ))
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/icd10", get(icd10))
        .route("/model/:model/invoke", post(invoke))
        .route("/model/:model/converse", post(converse))
        .route("/agents/:agent/agentAliases/:alias/sessions/:session/text", post(agent));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn reasoning(addr: SocketAddr, model: &str, format: EnvelopeFormat) -> HttpReasoningClient {
    HttpReasoningClient::new(
        ReasoningClientConfig {
            base_url: format!("http://{addr}"),
            model_id: model.to_string(),
            timeout_secs: 5,
            circuit_breaker: Some(CircuitBreakerConfig {
                failure_threshold: 2,
                reset_timeout_secs: 60,
                success_threshold: 1,
            }),
            ..Default::default()
        },
        format,
    )
    .unwrap()
}

mod code_reference_tests {
    use super::*;

    fn client(addr: SocketAddr) -> ClinicalTablesClient {
        ClinicalTablesClient::new(CodeReferenceConfig {
            base_url: format!("http://{addr}/icd10"),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_known_code_is_valid() {
        let addr = serve().await;
        let lookup = client(addr).lookup("M25.561").await.unwrap();
        assert!(lookup.valid);
        assert_eq!(lookup.description.as_deref(), Some("Pain in right knee"));
        assert_eq!(lookup.source, "NIH Clinical Tables");
    }

    #[tokio::test]
    async fn test_unknown_code_is_invalid() {
        let addr = serve().await;
        let lookup = client(addr).lookup("Q99.999").await.unwrap();
        assert!(!lookup.valid);
        assert!(lookup.description.is_none());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_unavailable_not_invalid() {
        let addr = serve().await;
        let misrouted = ClinicalTablesClient::new(CodeReferenceConfig {
            base_url: format!("http://{addr}/moved"),
            ..Default::default()
        })
        .unwrap();

        let err = misrouted.lookup("M25.561").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, PortError::ServiceUnavailable { .. }));

        let step = ValidationStep::new(Arc::new(misrouted), None, ReasoningConfig::default());
        let report = step.validate(&["M25.561".to_string()], &["73721".to_string()]).await;
        assert!(report.all_valid);
        assert_eq!(report.icd10_validations[0].valid, None);
        assert!(report.errors.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("Could not validate ICD-10 code: M25.561")));
    }
}

mod reasoning_tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_envelope_round_trip() {
        let addr = serve().await;
        let client = reasoning(addr, "m", EnvelopeFormat::Messages);
        let text = client.complete("hello", CompletionParams::new(0.2, 100)).await.unwrap();
        assert_eq!(text, "```json\n{\"echo\": \"hello\"}\n```");
    }

    #[tokio::test]
    async fn test_converse_envelope_round_trip() {
        let addr = serve().await;
        let client = reasoning(addr, "m", EnvelopeFormat::Converse);
        let text = client.complete("hello", CompletionParams::new(0.3, 100)).await.unwrap();
        assert_eq!(text, "converse:hello");
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let addr = serve().await;
        let client = reasoning(addr, "throttled", EnvelopeFormat::Messages);
        let err = client.complete("hello", CompletionParams::new(0.2, 100)).await.unwrap_err();
        assert!(matches!(err, PortError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_outage_opens_circuit() {
        let addr = serve().await;
        let client = reasoning(addr, "down", EnvelopeFormat::Messages);
        for _ in 0..2 {
            let err = client.complete("x", CompletionParams::new(0.2, 10)).await.unwrap_err();
            assert!(matches!(err, PortError::ServiceUnavailable { .. }));
        }
        let err = client.complete("x", CompletionParams::new(0.2, 10)).await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker is open"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let client = HttpReasoningClient::new(
            ReasoningClientConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                timeout_secs: 2,
                ..Default::default()
            },
            EnvelopeFormat::Messages,
        )
        .unwrap();
        let err = client.complete("x", CompletionParams::new(0.2, 10)).await.unwrap_err();
        assert!(err.is_transient());
    }
}

mod agent_tests {
    use super::*;

    fn client(addr: SocketAddr) -> HttpAgentClient {
        HttpAgentClient::new(AgentClientConfig {
            base_url: format!("http://{addr}"),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    fn invocation(agent_id: &str) -> AgentInvocation {
        AgentInvocation {
            agent_id: agent_id.to_string(),
            alias_id: "TSTALIASID".to_string(),
            session_id: "session-1".to_string(),
            input_text: "Process case".to_string(),
        }
    }

    #[tokio::test]
    async fn test_stream_is_concatenated() {
        let addr = serve().await;
        let response = client(addr).invoke_to_completion(invocation("AGENT")).await.unwrap();
        assert_eq!(response, "session-1: processed 'Process case'");
    }

    #[tokio::test]
    async fn test_missing_agent_is_not_found() {
        let addr = serve().await;
        let err = client(addr).invoke_to_completion(invocation("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
