//! Prior-Authorization Orchestrator - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin pa-orchestrator
//!
//! # Enable AI review and autonomous delegation
//! PA_REASONING__BASE_URL=http://localhost:8081 \
//! PA_AGENT__BASE_URL=http://localhost:8082 \
//! PA_ADJUDICATION__AUTONOMOUS__ENABLED=true \
//! PA_ADJUDICATION__AUTONOMOUS__AGENT_ID=AGENT1 \
//! cargo run --bin pa-orchestrator
//! ```
//!
//! # Environment Variables
//!
//! * `PA_HOST` / `PA_PORT` - Bind address (default: 0.0.0.0:8080)
//! * `PA_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `PA_LOG_FORMAT` - `pretty` or `json`
//! * `PA_DATABASE__URL` - PostgreSQL connection string
//! * `PA_BLOBS__ROOT` - Evidence document root (default: ./data)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_authorization::{AgentService, Collaborators, ReasoningService};
use infra_db::PostgresCaseStore;
use infra_external::{ClinicalTablesClient, FsBlobStore, HttpAgentClient, HttpReasoningClient};
use interface_api::config::{LogFormat, ServerConfig};
use interface_api::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let (config, config_error) = match ServerConfig::from_env() {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };

    init_tracing(&config.log_level, config.log_format);

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Invalid configuration in environment, using defaults");
    }

    tracing::info!(
        host = %config.host,
        port = %config.port,
        payer = %config.adjudication.payer_name,
        "Starting prior-authorization orchestrator"
    );

    let collaborators = build_collaborators(&config).await?;
    let app = create_router(AppState::new(config.adjudication.clone(), collaborators));

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
    }
}

/// Connects every adapter the orchestrator depends on
async fn build_collaborators(config: &ServerConfig) -> anyhow::Result<Collaborators> {
    let pool = infra_db::connect(&config.database)
        .await
        .context("case database unavailable")?;
    tracing::info!("Database ready");

    let reasoning: Option<Arc<dyn ReasoningService>> = match &config.reasoning {
        Some(reasoning) => Some(Arc::new(HttpReasoningClient::new(
            reasoning.clone(),
            config.adjudication.reasoning.envelope,
        )?)),
        None => {
            tracing::warn!("No reasoning endpoint configured, decisions will use fallback rules");
            None
        }
    };

    let agent: Option<Arc<dyn AgentService>> = match &config.agent {
        Some(agent) => Some(Arc::new(HttpAgentClient::new(agent.clone())?)),
        None => None,
    };
    if config.adjudication.autonomous.active_agent().is_some() && agent.is_none() {
        tracing::warn!("Autonomous delegation is enabled but no agent runtime is configured");
    }

    Ok(Collaborators {
        cases: Arc::new(PostgresCaseStore::new(pool)),
        codes: Arc::new(ClinicalTablesClient::new(config.code_reference.clone())?),
        blobs: Arc::new(FsBlobStore::new(config.blobs.clone())),
        reasoning,
        agent,
    })
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
