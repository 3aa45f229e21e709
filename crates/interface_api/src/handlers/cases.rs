//! Case handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use domain_authorization::{Case, CaseStatistics};

use crate::handlers::adjudication::parse_case_id;
use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

/// Gets a case record by ID
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Case>, ApiError> {
    let case_id = parse_case_id(&id)?;
    let case = state.cases.get(case_id).await?;
    Ok(Json(case))
}

/// Lists cases, newest first
pub async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Case>>, ApiError> {
    Ok(Json(state.cases.list(params.limit).await?))
}

/// Aggregate statistics over every stored case
pub async fn case_statistics(
    State(state): State<AppState>,
) -> Result<Json<CaseStatistics>, ApiError> {
    let cases = state.cases.list(None).await?;
    Ok(Json(CaseStatistics::from_cases(&cases)))
}
