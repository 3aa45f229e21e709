//! Prior Authorization Adjudication Domain
//!
//! This crate adjudicates prior-authorization cases: requests for upfront
//! payer approval of a medical procedure.
//!
//! # Pipeline
//!
//! The [`Orchestrator`] loads a case and either delegates it to an
//! autonomous agent or runs the deterministic pipeline:
//!
//! - **Validation**: diagnosis and procedure codes are verified against
//!   reference data, and every diagnosis/procedure pair is assessed for
//!   medical necessity
//! - **Evidence**: required supporting documents are derived from the
//!   procedure codes and looked up in blob storage
//! - **Decision**: an AI medical-necessity review decides; when it is
//!   unavailable or unparsable, an ordered rule table decides instead
//!
//! Every stage appends to the case timeline, an append-only audit log.
//!
//! # Collaborators
//!
//! Persistence, code reference data, blob storage, the reasoning service
//! and the autonomous agent are reached through the traits in [`ports`].
//! In-memory implementations live in `ports::mock` behind the `mock`
//! feature.
//!
//! # Examples
//!
//! ```rust
//! use domain_authorization::decision::{rules, PatientInfo, PayerRequest, ProviderInfo};
//! use domain_authorization::EvidenceFlags;
//!
//! let request = PayerRequest {
//!     patient: PatientInfo { name: "John Smith".into(), member_id: "12345".into() },
//!     diagnosis: vec![],
//!     procedures: vec!["73721".into()],
//!     clinical_summary: String::new(),
//!     evidence: EvidenceFlags::default(),
//!     provider: ProviderInfo::default(),
//! };
//!
//! let decision = rules::evaluate(&request);
//! assert_eq!(decision.denial_code.as_deref(), Some("MISSING_DIAGNOSIS_004"));
//! ```

pub mod case;
pub mod config;
pub mod decision;
pub mod error;
pub mod evidence;
pub mod orchestrator;
pub mod ports;
pub mod reasoning;
pub mod statistics;
pub mod validation;

pub use case::{Case, CaseStatus, CaseUpdate, EvidenceFlags, Patch, TimelineEvent, TimelineTag};
pub use config::{AdjudicationConfig, AutonomousAgentConfig, EvidenceConfig, ReasoningConfig};
pub use decision::{DecisionEngine, DecisionMethod, DecisionStatus, PayerDecision, PayerRequest};
pub use error::{AdjudicationError, RecoverableFailure};
pub use evidence::{EvidenceReport, EvidenceStep};
pub use orchestrator::{Collaborators, OrchestrationMethod, OrchestrationOutcome, Orchestrator};
pub use ports::{
    AgentInvocation, AgentService, AgentServiceExt, AgentStream, BlobStore, CaseStore, CodeLookup,
    CodeReference, CompletionParams, ReasoningService,
};
pub use reasoning::{Envelope, EnvelopeFormat};
pub use statistics::CaseStatistics;
pub use validation::{ValidationReport, ValidationStep};
