//! PostgreSQL Case Adapter
//!
//! Implements the `CaseStore` port on top of [`CaseRepository`]. Cases
//! round-trip through their JSON document form; the status column mirrors
//! the document's status.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::PostgresCaseStore;
//! use domain_authorization::CaseStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn CaseStore> = Arc::new(PostgresCaseStore::new(pool));
//! let case = store.get(case_id).await?;
//! ```

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, CaseId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_authorization::{Case, CaseStore, CaseUpdate, TimelineEvent};

use crate::error::DatabaseError;
use crate::repositories::cases::{CaseRepository, CaseRow};

const ADAPTER_ID: &str = "postgres-case-store";

/// PostgreSQL-backed implementation of the CaseStore port
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - `DatabaseError::DuplicateEntry` -> `PortError::Conflict`
/// - Connection failures -> `PortError::Connection`
/// - Other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresCaseStore {
    repository: CaseRepository,
    pool: PgPool,
}

impl PostgresCaseStore {
    /// Creates a new PostgreSQL case store
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CaseRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &CaseRepository {
        &self.repository
    }
}

impl DomainPort for PostgresCaseStore {}

#[async_trait]
impl HealthCheckable for PostgresCaseStore {
    /// Checks database connectivity with a `SELECT 1`
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Healthy, latency_ms),
            Err(e) => HealthCheckResult::new(ADAPTER_ID, AdapterHealth::Unhealthy, latency_ms)
                .with_message(format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl CaseStore for PostgresCaseStore {
    #[instrument(skip(self, case_id), fields(case_id = %case_id))]
    async fn get(&self, case_id: CaseId) -> Result<Case, PortError> {
        debug!("Fetching case");

        let row = self
            .repository
            .get_by_id(case_id.into())
            .await
            .map_err(PortError::from)?;

        row_to_case(row).map_err(PortError::from)
    }

    #[instrument(skip(self, case), fields(case_id = %case.case_id))]
    async fn insert(&self, case: Case) -> Result<(), PortError> {
        let row = case_to_row(&case)?;
        self.repository.insert(&row).await.map_err(PortError::from)
    }

    #[instrument(skip(self, case_id, update), fields(case_id = %case_id))]
    async fn update(&self, case_id: CaseId, update: CaseUpdate) -> Result<Case, PortError> {
        let row = self
            .repository
            .modify(case_id.into(), |row| {
                let mut case = row_to_case(row)?;
                case.apply(update);
                case_to_row(&case)
            })
            .await
            .map_err(PortError::from)?;

        row_to_case(row).map_err(PortError::from)
    }

    #[instrument(skip(self, case_id, event), fields(case_id = %case_id))]
    async fn append_timeline(&self, case_id: CaseId, event: TimelineEvent) -> Result<(), PortError> {
        self.repository
            .modify(case_id.into(), |row| {
                let mut case = row_to_case(row)?;
                case.timeline.push(event);
                case_to_row(&case)
            })
            .await
            .map(|_| ())
            .map_err(PortError::from)
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: Option<u32>) -> Result<Vec<Case>, PortError> {
        let rows = self
            .repository
            .list(limit.map(i64::from))
            .await
            .map_err(PortError::from)?;

        rows.into_iter()
            .map(|row| row_to_case(row).map_err(PortError::from))
            .collect()
    }
}

// ============================================================================
// Row <-> domain conversion
// ============================================================================

fn row_to_case(row: CaseRow) -> Result<Case, DatabaseError> {
    let case: Case = serde_json::from_value(row.record)?;
    if *case.case_id.as_uuid() != row.case_id {
        return Err(DatabaseError::SerializationError(format!(
            "record for {} carries case id {}",
            row.case_id, case.case_id
        )));
    }
    Ok(case)
}

fn case_to_row(case: &Case) -> Result<CaseRow, DatabaseError> {
    Ok(CaseRow {
        case_id: *case.case_id.as_uuid(),
        status: case.status.as_str().to_string(),
        record: serde_json::to_value(case)?,
        created_at: case.created_at,
        updated_at: case.updated_at,
    })
}
