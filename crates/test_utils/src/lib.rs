//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! prior-authorization test suite.
//!
//! # Modules
//!
//! - `fixtures`: Canned codes and reasoning-service responses
//! - `builders`: Builder for test cases
//! - `database`: Postgres test container
//! - `assertions`: Assertion helpers for case records
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
