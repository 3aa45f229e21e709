//! Core Kernel - Foundational types shared by the prior-authorization crates
//!
//! This crate provides the building blocks used across the workspace:
//! - Strongly-typed identifiers
//! - Ports infrastructure (`PortError`, health checks, circuit breaker settings)
//!   that every collaborator adapter implements against

pub mod identifiers;
pub mod ports;

pub use identifiers::{CaseId, RequestId};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    CircuitBreakerConfig,
};
