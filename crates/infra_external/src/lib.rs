//! External Collaborator Adapters
//!
//! Implements the domain's collaborator ports against real services:
//!
//! - [`ClinicalTablesClient`]: diagnosis-code lookup against the NIH
//!   Clinical Tables ICD-10-CM search API
//! - [`HttpReasoningClient`]: single-turn text completion, speaking the
//!   envelope format selected by configuration
//! - [`HttpAgentClient`]: autonomous-agent runs streamed back as text chunks
//! - [`FsBlobStore`]: evidence documents on a local or mounted filesystem
//!
//! Every HTTP adapter sits behind a [`CircuitBreaker`] and maps transport
//! failures onto `PortError`:
//! - 404 -> `PortError::NotFound`
//! - 401/403 -> `PortError::Unauthorized`
//! - 429 -> `PortError::RateLimited`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - Timeouts -> `PortError::Timeout`
//! - Undecodable bodies -> `PortError::Transformation`

pub mod agent;
pub mod blob;
pub mod circuit_breaker;
pub mod code_reference;
pub mod config;
pub mod http;
pub mod reasoning;

pub use agent::HttpAgentClient;
pub use blob::FsBlobStore;
pub use circuit_breaker::CircuitBreaker;
pub use code_reference::ClinicalTablesClient;
pub use config::{AgentClientConfig, BlobStoreConfig, CodeReferenceConfig, ReasoningClientConfig};
pub use reasoning::HttpReasoningClient;
