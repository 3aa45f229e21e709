//! Port adapters backed by PostgreSQL
//!
//! Adapters implement the domain's port traits on top of the repositories.

pub mod cases;

pub use cases::PostgresCaseStore;
