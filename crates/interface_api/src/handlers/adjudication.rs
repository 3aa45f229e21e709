//! Adjudication handlers

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use core_kernel::CaseId;
use domain_authorization::{reasoning::unwrap_envelope, OrchestrationOutcome, PayerDecision};

use crate::{error::ApiError, AppState};

/// Parses a case identifier, with or without its display prefix
pub(crate) fn parse_case_id(raw: &str) -> Result<CaseId, ApiError> {
    CaseId::from_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid case_id '{}'", raw)))
}

/// Extracts the case id from a bare or enveloped payload
fn case_id_from_payload(payload: Value) -> Result<CaseId, ApiError> {
    match unwrap_envelope(payload).get("case_id") {
        Some(Value::String(raw)) if !raw.trim().is_empty() => parse_case_id(raw),
        _ => Err(ApiError::BadRequest("case_id is required".to_string())),
    }
}

/// Runs the pipeline for the case named in the payload
///
/// Accepts `{"case_id": ...}` or a transport envelope around it.
pub async fn adjudicate(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<OrchestrationOutcome>, ApiError> {
    let case_id = case_id_from_payload(payload)?;
    run(&state, case_id).await
}

/// Runs the pipeline for the case in the path
pub async fn adjudicate_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrchestrationOutcome>, ApiError> {
    let case_id = parse_case_id(&id)?;
    run(&state, case_id).await
}

async fn run(state: &AppState, case_id: CaseId) -> Result<Json<OrchestrationOutcome>, ApiError> {
    info!(case_id = %case_id, "Adjudication requested");
    let outcome = state.orchestrator.process(case_id).await?;
    Ok(Json(outcome))
}

/// Decides a payer request directly, without a stored case
pub async fn decide(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<PayerDecision> {
    Json(state.decisions.decide_payload(payload).await)
}
