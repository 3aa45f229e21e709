//! HTTP API Layer
//!
//! REST surface for prior-authorization adjudication, built on Axum.
//!
//! # Routes
//!
//! - `GET  /health`, `GET /health/ready`
//! - `POST /api/v1/adjudications` with `{"case_id": ...}` (bare or enveloped)
//! - `POST /api/v1/cases/:id/adjudicate`
//! - `GET  /api/v1/cases`, `GET /api/v1/cases/statistics`, `GET /api/v1/cases/:id`
//! - `POST /api/v1/decisions` with a payer request payload
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(config, collaborators));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    http::HeaderName,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_authorization::{AdjudicationConfig, CaseStore, Collaborators, DecisionEngine, Orchestrator};

use crate::handlers::{adjudication, cases, health};
use crate::middleware::{request_logging, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Standalone payer decisions, outside any stored case
    pub decisions: Arc<DecisionEngine>,
    pub cases: Arc<dyn CaseStore>,
}

impl AppState {
    pub fn new(config: AdjudicationConfig, collaborators: Collaborators) -> Self {
        let decisions = DecisionEngine::new(
            collaborators.reasoning.clone(),
            config.reasoning.clone(),
            config.payer_name.clone(),
        );
        let cases = collaborators.cases.clone();
        Self {
            orchestrator: Arc::new(Orchestrator::new(config, collaborators)),
            decisions: Arc::new(decisions),
            cases,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // `statistics` must be registered ahead of the `:id` capture
    let case_routes = Router::new()
        .route("/", get(cases::list_cases))
        .route("/statistics", get(cases::case_statistics))
        .route("/:id", get(cases::get_case))
        .route("/:id/adjudicate", post(adjudication::adjudicate_case));

    let api_routes = Router::new()
        .route("/adjudications", post(adjudication::adjudicate))
        .route("/decisions", post(adjudication::decide))
        .nest("/cases", case_routes);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(request_logging)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
