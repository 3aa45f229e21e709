//! Case repository implementation
//!
//! Cases are stored as JSONB documents. The repository is schema-agnostic
//! about the document itself; it only reads and writes whole records and
//! keeps the `status` and `updated_at` columns in step with them.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;

/// A stored case row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaseRow {
    pub case_id: Uuid,
    pub status: String,
    pub record: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for prior-authorization case documents
#[derive(Debug, Clone)]
pub struct CaseRepository {
    pool: PgPool,
}

impl CaseRepository {
    /// Creates a new CaseRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a case by its identifier
    ///
    /// # Returns
    ///
    /// The stored row or a NotFound error
    pub async fn get_by_id(&self, case_id: Uuid) -> Result<CaseRow, DatabaseError> {
        sqlx::query_as::<_, CaseRow>(
            r#"
            SELECT case_id, status, record, created_at, updated_at
            FROM cases
            WHERE case_id = $1
            "#,
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Case", case_id))
    }

    /// Inserts a new case
    ///
    /// Fails with `DuplicateEntry` when the identifier is already taken.
    pub async fn insert(&self, row: &CaseRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO cases (case_id, status, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.case_id)
        .bind(&row.status)
        .bind(&row.record)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(case_id = %row.case_id, "Inserted case");
        Ok(())
    }

    /// Lists cases, newest first
    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<CaseRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CaseRow>(
            r#"
            SELECT case_id, status, record, created_at, updated_at
            FROM cases
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Read-modify-write of a single case under a row lock
    ///
    /// The row is locked with `SELECT ... FOR UPDATE` for the duration of the
    /// transaction, so concurrent modifications of the same case serialize.
    /// The closure receives the current row and returns its replacement;
    /// returning an error rolls the transaction back.
    pub async fn modify<F>(&self, case_id: Uuid, change: F) -> Result<CaseRow, DatabaseError>
    where
        F: FnOnce(CaseRow) -> Result<CaseRow, DatabaseError> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, CaseRow>(
            r#"
            SELECT case_id, status, record, created_at, updated_at
            FROM cases
            WHERE case_id = $1
            FOR UPDATE
            "#,
        )
        .bind(case_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Case", case_id))?;

        let next = change(current)?;

        sqlx::query(
            r#"
            UPDATE cases
            SET status = $2, record = $3, updated_at = $4
            WHERE case_id = $1
            "#,
        )
        .bind(case_id)
        .bind(&next.status)
        .bind(&next.record)
        .bind(next.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(case_id = %case_id, status = %next.status, "Updated case");
        Ok(next)
    }
}
