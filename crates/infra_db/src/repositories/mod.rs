//! Repository implementations
//!
//! Repositories own the SQL for one aggregate each and return
//! `DatabaseError` on failure.

pub mod cases;

pub use cases::CaseRepository;
