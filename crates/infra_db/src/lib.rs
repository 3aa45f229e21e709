//! Infrastructure Database Layer
//!
//! This crate persists prior-authorization cases in PostgreSQL using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. [`CaseRepository`] owns the SQL;
//! [`PostgresCaseStore`] adapts it to the domain's `CaseStore` port and
//! translates database errors into port errors.
//!
//! # Storage Model
//!
//! Each case is stored as a single JSONB document keyed by its identifier,
//! with the status lifted into its own column for filtering. Updates and
//! timeline appends run inside a transaction that locks the row, so
//! concurrent writers never lose each other's changes.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{connect, DatabaseConfig, PostgresCaseStore};
//!
//! let pool = connect(&DatabaseConfig::new("postgres://localhost/prior_auth")).await?;
//! let store = PostgresCaseStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{connect, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use repositories::CaseRepository;
pub use adapters::PostgresCaseStore;
