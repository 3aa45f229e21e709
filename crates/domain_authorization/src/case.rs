//! Case aggregate
//!
//! A case is one prior-authorization request under adjudication. Records are
//! created upstream in the `extracted` state and are mutated only through
//! [`CaseUpdate`] patches and timeline appends issued by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::CaseId;

use crate::decision::PayerDecision;
use crate::evidence::EvidenceReport;
use crate::validation::ValidationReport;

/// Case status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Created by the extraction process, not yet adjudicated
    Extracted,
    /// An orchestration run is in flight
    Processing,
    /// Codes failed validation; no payer decision was requested
    ValidationFailed,
    /// Payer approved the request
    Approved,
    /// Payer denied the request
    Denied,
    /// Infrastructure failure during a run
    Error,
    /// Completed by autonomous delegation
    Completed,
}

impl CaseStatus {
    /// Returns true if an orchestration run ends in this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::ValidationFailed
                | CaseStatus::Approved
                | CaseStatus::Denied
                | CaseStatus::Error
                | CaseStatus::Completed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Extracted => "extracted",
            CaseStatus::Processing => "processing",
            CaseStatus::ValidationFailed => "validation_failed",
            CaseStatus::Approved => "approved",
            CaseStatus::Denied => "denied",
            CaseStatus::Error => "error",
            CaseStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short status tag attached to each timeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineTag {
    Extracted,
    Processing,
    Delegating,
    Validating,
    Checking,
    Submitting,
    Success,
    Warning,
    Error,
    Approved,
    Denied,
    Completed,
    Info,
}

/// One audit entry in a case timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub status: TimelineTag,
}

impl TimelineEvent {
    /// Creates an event stamped with the current time
    pub fn now(event: impl Into<String>, status: TimelineTag) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            status,
        }
    }
}

/// Document-type flags extracted from the clinical note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceFlags {
    pub pt_notes: bool,
    pub clinical_notes: bool,
    pub xray: bool,
    pub referral: bool,
}

/// A prior-authorization case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Unique identifier
    pub case_id: CaseId,
    pub patient_name: String,
    /// Free-text diagnosis
    #[serde(default)]
    pub diagnosis: String,
    /// Clinical summary written by the extraction step
    #[serde(default)]
    pub summary: String,
    /// Diagnosis codes
    #[serde(rename = "ICD10", default)]
    pub icd10: Vec<String>,
    /// Procedure codes
    #[serde(rename = "CPT", default)]
    pub cpt: Vec<String>,
    /// Flags as extracted upstream; absent keys are kept absent so the
    /// decision request can apply its own defaults
    #[serde(default)]
    pub evidence: Option<serde_json::Map<String, serde_json::Value>>,
    pub status: CaseStatus,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_result: Option<EvidenceReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_result: Option<PayerDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl Case {
    /// Creates a freshly extracted case
    pub fn extracted(
        patient_name: impl Into<String>,
        diagnosis: impl Into<String>,
        icd10: Vec<String>,
        cpt: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            case_id: CaseId::new(),
            patient_name: patient_name.into(),
            diagnosis: diagnosis.into(),
            summary: String::new(),
            icd10,
            cpt,
            evidence: None,
            status: CaseStatus::Extracted,
            timeline: vec![TimelineEvent::now(
                "Clinical note uploaded and extracted",
                TimelineTag::Extracted,
            )],
            validation_result: None,
            evidence_result: None,
            payer_result: None,
            authorization_number: None,
            denial_reason: None,
            orchestration_method: None,
            agent_response: None,
            error: None,
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            processed_at: None,
        }
    }

    /// Evidence flags as seen by the decision request
    ///
    /// Missing flags default to `false`, except `clinical_notes`, which
    /// defaults to `true` because every extracted case originates from one.
    pub fn evidence_flags(&self) -> EvidenceFlags {
        let flag = |key: &str, default: bool| {
            self.evidence
                .as_ref()
                .and_then(|m| m.get(key))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(default)
        };
        EvidenceFlags {
            pt_notes: flag("pt_notes", false),
            clinical_notes: flag("clinical_notes", true),
            xray: flag("xray", false),
            referral: flag("referral", false),
        }
    }

    /// Applies a partial update, leaving untouched fields as they are
    pub fn apply(&mut self, update: CaseUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        update.validation_result.apply_to(&mut self.validation_result);
        update.evidence_result.apply_to(&mut self.evidence_result);
        update.payer_result.apply_to(&mut self.payer_result);
        update.authorization_number.apply_to(&mut self.authorization_number);
        update.denial_reason.apply_to(&mut self.denial_reason);
        update.orchestration_method.apply_to(&mut self.orchestration_method);
        update.agent_response.apply_to(&mut self.agent_response);
        update.error.apply_to(&mut self.error);
        update.processing_started_at.apply_to(&mut self.processing_started_at);
        update.processed_at.apply_to(&mut self.processed_at);
        self.updated_at = Utc::now();
    }
}

/// Tri-state patch for an optional field
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    /// Leave the stored value untouched
    Keep,
    /// Overwrite with a new value
    Set(T),
    /// Remove the stored value
    Clear,
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    /// `Set` when a value is present, `Clear` otherwise
    pub fn set_or_clear(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }

    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(v) => *slot = Some(v),
            Patch::Clear => *slot = None,
        }
    }
}

/// Partial update with merge semantics
///
/// Fields left at `Keep` are not written. The timeline is never part of an
/// update; it only grows through the store's append operation.
#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub status: Option<CaseStatus>,
    pub validation_result: Patch<ValidationReport>,
    pub evidence_result: Patch<EvidenceReport>,
    pub payer_result: Patch<PayerDecision>,
    pub authorization_number: Patch<String>,
    pub denial_reason: Patch<String>,
    pub orchestration_method: Patch<String>,
    pub agent_response: Patch<String>,
    pub error: Patch<String>,
    pub processing_started_at: Patch<DateTime<Utc>>,
    pub processed_at: Patch<DateTime<Utc>>,
}

impl CaseUpdate {
    /// Update carrying only a status change
    pub fn status(status: CaseStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_case() -> Case {
        Case::extracted("John Smith", "Right knee pain", vec!["M25.561".into()], vec!["73721".into()])
    }

    #[test]
    fn test_new_case_is_extracted_with_one_event() {
        let case = sample_case();
        assert_eq!(case.status, CaseStatus::Extracted);
        assert_eq!(case.timeline.len(), 1);
        assert_eq!(case.timeline[0].status, TimelineTag::Extracted);
    }

    #[test]
    fn test_terminal_statuses() {
        use CaseStatus::*;
        for status in [ValidationFailed, Approved, Denied, Error, Completed] {
            assert!(status.is_terminal(), "{status}");
        }
        assert!(!Extracted.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&CaseStatus::ValidationFailed).unwrap();
        assert_eq!(json, "\"validation_failed\"");
        assert_eq!(CaseStatus::ValidationFailed.to_string(), "validation_failed");
    }

    #[test]
    fn test_evidence_flag_defaults() {
        let mut case = sample_case();
        let flags = case.evidence_flags();
        assert!(!flags.pt_notes);
        assert!(flags.clinical_notes);

        case.evidence = json!({"pt_notes": true, "clinical_notes": false})
            .as_object()
            .cloned();
        let flags = case.evidence_flags();
        assert!(flags.pt_notes);
        assert!(!flags.clinical_notes);
        assert!(!flags.referral);
    }

    #[test]
    fn test_apply_merges_and_clears() {
        let mut case = sample_case();
        case.authorization_number = Some("AUTH-OLD".into());
        case.summary = "kept".into();

        case.apply(CaseUpdate {
            status: Some(CaseStatus::Denied),
            authorization_number: Patch::Clear,
            denial_reason: Patch::Set("Missing PT notes".into()),
            ..Default::default()
        });

        assert_eq!(case.status, CaseStatus::Denied);
        assert_eq!(case.authorization_number, None);
        assert_eq!(case.denial_reason.as_deref(), Some("Missing PT notes"));
        assert_eq!(case.summary, "kept");
        assert_eq!(case.timeline.len(), 1);
    }

    #[test]
    fn test_record_uses_upstream_field_names() {
        let case = sample_case();
        let value = serde_json::to_value(&case).unwrap();
        assert_eq!(value["ICD10"], json!(["M25.561"]));
        assert_eq!(value["CPT"], json!(["73721"]));
        assert_eq!(value["status"], json!("extracted"));
        assert!(value.get("payer_result").is_none());
    }
}
