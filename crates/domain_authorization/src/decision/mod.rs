//! Decision Engine
//!
//! Produces the approve/deny decision for a payer request:
//!
//! ```text
//! intake screen ──deny──▶ decision (intake_screen)
//!      │ pass
//!      ▼
//! AI medical-necessity review ──ok──▶ decision (ai_review)
//!      │ recoverable failure
//!      ▼
//! ordered fallback rules ──────────▶ decision (rule_fallback)
//! ```
//!
//! The AI path and the rule path never both run to completion for the same
//! request; every decision records which one produced it.

pub mod intake;
pub mod review;
pub mod rules;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::RequestId;

use crate::case::{Case, CaseStatus, EvidenceFlags};
use crate::config::ReasoningConfig;
use crate::ports::ReasoningService;
use crate::reasoning;

pub use rules::{FallbackRule, FALLBACK_RULES};

/// Patient block of a payer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub member_id: String,
}

/// Provider block of a payer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub npi: String,
    pub name: String,
}

impl Default for ProviderInfo {
    fn default() -> Self {
        Self {
            npi: "1234567890".to_string(),
            name: "Demo Provider".to_string(),
        }
    }
}

/// A prior-authorization request as submitted to the payer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerRequest {
    pub patient: PatientInfo,
    pub diagnosis: Vec<String>,
    pub procedures: Vec<String>,
    #[serde(default)]
    pub clinical_summary: String,
    #[serde(default)]
    pub evidence: EvidenceFlags,
    #[serde(default)]
    pub provider: ProviderInfo,
}

impl PayerRequest {
    /// Builds the request for a stored case
    pub fn for_case(case: &Case) -> Self {
        Self {
            patient: PatientInfo {
                name: case.patient_name.clone(),
                member_id: case.case_id.member_reference(),
            },
            diagnosis: case.icd10.clone(),
            procedures: case.cpt.clone(),
            clinical_summary: format!("{} | Diagnosis: {}", case.summary, case.diagnosis),
            evidence: case.evidence_flags(),
            provider: ProviderInfo::default(),
        }
    }
}

/// Payer verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionStatus {
    Approved,
    Denied,
}

impl DecisionStatus {
    /// Case status this verdict leads to
    pub fn case_status(self) -> CaseStatus {
        match self {
            DecisionStatus::Approved => CaseStatus::Approved,
            DecisionStatus::Denied => CaseStatus::Denied,
        }
    }
}

/// Which path produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    IntakeScreen,
    AiReview,
    RuleFallback,
}

/// The payer's decision on one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerDecision {
    pub status: DecisionStatus,
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub payer: String,
    pub method: DecisionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approved_procedures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_code: Option<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_necessity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_appropriateness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_guideline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PayerDecision {
    fn base(status: DecisionStatus, method: DecisionMethod) -> Self {
        Self {
            status,
            request_id: RequestId::new_v7(),
            timestamp: Utc::now(),
            payer: String::new(),
            method,
            authorization_number: None,
            valid_from: None,
            valid_until: None,
            approved_procedures: Vec::new(),
            reason: None,
            denial_code: None,
            required_documents: Vec::new(),
            next_steps: None,
            confidence: None,
            medical_necessity: None,
            code_appropriateness: None,
            clinical_guideline: None,
            message: None,
        }
    }

    /// Approves the given procedures with a fresh authorization number
    pub fn approve(method: DecisionMethod, procedures: &[String]) -> Self {
        let now = Utc::now();
        Self {
            authorization_number: Some(authorization_number(now)),
            valid_from: Some(now),
            valid_until: end_of_year(now),
            approved_procedures: procedures.to_vec(),
            message: Some("Prior authorization approved".to_string()),
            ..Self::base(DecisionStatus::Approved, method)
        }
    }

    /// Denies with a reason and denial code
    pub fn deny(method: DecisionMethod, reason: impl Into<String>, denial_code: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            denial_code: Some(denial_code.into()),
            ..Self::base(DecisionStatus::Denied, method)
        }
    }

    pub fn with_required_documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_documents = documents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_next_steps(mut self, next_steps: impl Into<String>) -> Self {
        self.next_steps = Some(next_steps.into());
        self
    }

    pub fn with_confidence(mut self, confidence: impl Into<String>) -> Self {
        self.confidence = Some(confidence.into());
        self
    }

    pub fn is_approved(&self) -> bool {
        self.status == DecisionStatus::Approved
    }
}

/// Generates `AUTH-YYYYMMDD-XXXXXXXX`
///
/// Uniqueness is probabilistic (32 random bits per day); numbers are not
/// checked against the case store.
pub fn authorization_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("AUTH-{}-{}", now.format("%Y%m%d"), suffix)
}

/// Dec 31 23:59:59 of the year of `now`
fn end_of_year(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    use chrono::Datelike;
    NaiveDate::from_ymd_opt(now.year(), 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
}

/// Decision engine: AI review first, ordered rules as fallback
pub struct DecisionEngine {
    reasoning: Option<Arc<dyn ReasoningService>>,
    config: ReasoningConfig,
    payer_name: String,
}

impl DecisionEngine {
    pub fn new(
        reasoning: Option<Arc<dyn ReasoningService>>,
        config: ReasoningConfig,
        payer_name: impl Into<String>,
    ) -> Self {
        Self {
            reasoning,
            config,
            payer_name: payer_name.into(),
        }
    }

    /// Decides a typed request
    pub async fn decide(&self, request: &PayerRequest) -> PayerDecision {
        let decision = match intake::screen(&request.diagnosis, &request.procedures) {
            Some(denial) => denial,
            None => self.review_or_fallback(request).await,
        };
        self.stamp(decision)
    }

    /// Decides a raw payload, possibly wrapped in a transport envelope
    pub async fn decide_payload(&self, payload: Value) -> PayerDecision {
        match intake::parse_payload(reasoning::unwrap_envelope(payload)) {
            Ok(request) => self.decide(&request).await,
            Err(denial) => self.stamp(denial),
        }
    }

    async fn review_or_fallback(&self, request: &PayerRequest) -> PayerDecision {
        match review::review(self.reasoning.as_deref(), request, self.config.review).await {
            Ok(decision) => decision,
            Err(failure) => {
                warn!(reason = %failure, "AI review unavailable, applying fallback rules");
                rules::evaluate(request)
            }
        }
    }

    fn stamp(&self, mut decision: PayerDecision) -> PayerDecision {
        decision.payer = self.payer_name.clone();
        info!(
            request_id = %decision.request_id,
            status = ?decision.status,
            method = ?decision.method,
            "Payer decision made"
        );
        decision
    }
}
