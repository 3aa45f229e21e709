//! Reasoning-service envelopes and structured-output parsing
//!
//! The reasoning service is reached through one of two request/response
//! envelope shapes. The shape is chosen by configuration ([`EnvelopeFormat`])
//! and handled by one [`Envelope`] adapter per shape.
//!
//! Model output is expected to be a single JSON object, optionally wrapped in
//! a markdown code fence. Anything that fails to parse is reported as a
//! [`RecoverableFailure`] so callers fall back instead of failing the case.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use core_kernel::PortError;

use crate::error::RecoverableFailure;
use crate::ports::{CompletionParams, ReasoningService};

/// Request/response envelope understood by the reasoning endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeFormat {
    /// `{anthropic_version, max_tokens, temperature, messages}` in,
    /// `content[0].text` out
    #[default]
    Messages,
    /// `{messages: [{content: [{text}]}], inferenceConfig}` in,
    /// `output.message.content[0].text` out
    Converse,
}

impl EnvelopeFormat {
    /// Returns the adapter for this format
    pub fn envelope(self) -> &'static dyn Envelope {
        match self {
            EnvelopeFormat::Messages => &MessagesEnvelope,
            EnvelopeFormat::Converse => &ConverseEnvelope,
        }
    }
}

/// One envelope shape
pub trait Envelope: Send + Sync {
    /// Builds the request body for a single-turn prompt
    fn request_body(&self, prompt: &str, params: CompletionParams) -> Value;

    /// Pulls the model text out of a response body
    fn extract_text(&self, response: &Value) -> Result<String, PortError>;
}

const MESSAGES_API_VERSION: &str = "bedrock-2023-05-31";

/// Messages-style envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagesEnvelope;

impl Envelope for MessagesEnvelope {
    fn request_body(&self, prompt: &str, params: CompletionParams) -> Value {
        json!({
            "anthropic_version": MESSAGES_API_VERSION,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "messages": [{"role": "user", "content": prompt}],
        })
    }

    fn extract_text(&self, response: &Value) -> Result<String, PortError> {
        response
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PortError::transformation("response has no content[0].text"))
    }
}

/// Converse-style envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ConverseEnvelope;

impl Envelope for ConverseEnvelope {
    fn request_body(&self, prompt: &str, params: CompletionParams) -> Value {
        json!({
            "messages": [{"role": "user", "content": [{"text": prompt}]}],
            "inferenceConfig": {
                "temperature": params.temperature,
                "maxTokens": params.max_tokens,
            },
        })
    }

    fn extract_text(&self, response: &Value) -> Result<String, PortError> {
        response
            .pointer("/output/message/content/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PortError::transformation("response has no output.message.content[0].text"))
    }
}

/// Removes a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parses model output into a typed judgment
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, RecoverableFailure> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| RecoverableFailure::Unparsable(e.to_string()))
}

/// Sends a prompt and parses the reply, folding every failure into a
/// recoverable one
pub async fn judge<T: DeserializeOwned>(
    service: Option<&dyn ReasoningService>,
    prompt: &str,
    params: CompletionParams,
) -> Result<T, RecoverableFailure> {
    let service = service.ok_or(RecoverableFailure::NotConfigured)?;
    let text = service.complete(prompt, params).await?;
    parse_structured(&text)
}

/// Unwraps a transport envelope
///
/// Payloads may arrive as `{"body": "<json string>"}`, `{"body": {...}}`, or
/// bare. A string body that is not JSON is returned unchanged.
pub fn unwrap_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("body") => match map.remove("body") {
            Some(Value::String(raw)) => {
                serde_json::from_str(&raw).unwrap_or(Value::String(raw))
            }
            Some(body) => body,
            None => Value::Object(map),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Judgment {
        decision: String,
        confidence: String,
    }

    // ========================================================================
    // Fences
    // ========================================================================

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```{\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_fenced_and_plain_parse_identically() {
        let plain = r#"{"decision": "APPROVED", "confidence": "high"}"#;
        let fenced = format!("```json{}```", plain);
        let a: Judgment = parse_structured(plain).unwrap();
        let b: Judgment = parse_structured(&fenced).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unparsable_is_recoverable() {
        let result: Result<Judgment, _> = parse_structured("I think this should be approved.");
        assert!(matches!(result, Err(RecoverableFailure::Unparsable(_))));
    }

    proptest! {
        #[test]
        fn prop_fence_stripping_preserves_json(n in any::<i64>(), s in "[a-zA-Z0-9 ]{0,20}") {
            let body = serde_json::to_string(&json!({"n": n, "s": s})).unwrap();
            let fenced = format!("```json\n{}\n```", body);
            let a: Value = parse_structured(&body).unwrap();
            let b: Value = parse_structured(&fenced).unwrap();
            prop_assert_eq!(a, b);
        }
    }

    // ========================================================================
    // Envelopes
    // ========================================================================

    #[test]
    fn test_messages_envelope_round() {
        let env = EnvelopeFormat::Messages.envelope();
        let body = env.request_body("hello", CompletionParams::new(0.2, 1500));
        assert_eq!(body["max_tokens"], 1500);
        assert_eq!(body["messages"][0]["content"], "hello");

        let response = json!({"content": [{"type": "text", "text": "{}"}]});
        assert_eq!(env.extract_text(&response).unwrap(), "{}");
    }

    #[test]
    fn test_converse_envelope_round() {
        let env = EnvelopeFormat::Converse.envelope();
        let body = env.request_body("hello", CompletionParams::new(0.3, 400));
        assert_eq!(body["inferenceConfig"]["maxTokens"], 400);
        assert_eq!(body["messages"][0]["content"][0]["text"], "hello");

        let response = json!({"output": {"message": {"content": [{"text": "ok"}]}}});
        assert_eq!(env.extract_text(&response).unwrap(), "ok");
    }

    #[test]
    fn test_wrong_envelope_is_transformation_error() {
        let response = json!({"output": {"message": {"content": [{"text": "ok"}]}}});
        let err = EnvelopeFormat::Messages.envelope().extract_text(&response).unwrap_err();
        assert!(matches!(err, PortError::Transformation { .. }));
    }

    #[test]
    fn test_envelope_format_from_config_string() {
        let format: EnvelopeFormat = serde_json::from_str("\"converse\"").unwrap();
        assert_eq!(format, EnvelopeFormat::Converse);
    }

    // ========================================================================
    // Transport unwrapping
    // ========================================================================

    #[test]
    fn test_unwrap_string_body() {
        let payload = json!({"body": "{\"case_id\": \"abc\"}"});
        assert_eq!(unwrap_envelope(payload), json!({"case_id": "abc"}));
    }

    #[test]
    fn test_unwrap_object_body_and_bare() {
        assert_eq!(unwrap_envelope(json!({"body": {"x": 1}})), json!({"x": 1}));
        assert_eq!(unwrap_envelope(json!({"x": 1})), json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_judge_without_service_is_not_configured() {
        let result: Result<Value, _> = judge(None, "prompt", CompletionParams::new(0.2, 10)).await;
        assert_eq!(result.unwrap_err(), RecoverableFailure::NotConfigured);
    }
}
