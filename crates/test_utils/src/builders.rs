//! Test Data Builders
//!
//! Provides a builder for constructing test cases with sensible defaults.
//! Tests specify only the relevant fields and take defaults for the rest.

use chrono::{DateTime, Utc};
use core_kernel::CaseId;
use domain_authorization::{Case, CaseStatus};
use serde_json::{Map, Value};

use crate::fixtures::CodeFixtures;

/// Builder for constructing test cases
///
/// # Example
///
/// ```rust
/// use test_utils::CaseBuilder;
///
/// let case = CaseBuilder::new()
///     .with_codes(&["M54.5"], &["72148"])
///     .with_evidence_flag("pt_notes", true)
///     .build();
///
/// assert_eq!(case.icd10, vec!["M54.5"]);
/// ```
pub struct CaseBuilder {
    case_id: CaseId,
    patient_name: String,
    diagnosis: String,
    summary: String,
    icd10: Vec<String>,
    cpt: Vec<String>,
    evidence: Option<Map<String, Value>>,
    status: CaseStatus,
    denial_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl Default for CaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseBuilder {
    /// Creates a builder for a knee MRI request with no supporting evidence
    pub fn new() -> Self {
        Self {
            case_id: CaseId::new(),
            patient_name: "John Smith".to_string(),
            diagnosis: "Right knee pain".to_string(),
            summary: "Persistent right knee pain for three months.".to_string(),
            icd10: vec![CodeFixtures::knee_pain().to_string()],
            cpt: vec![CodeFixtures::knee_mri().to_string()],
            evidence: None,
            status: CaseStatus::Extracted,
            denial_reason: None,
            created_at: None,
        }
    }

    /// Sets the case identifier
    pub fn with_case_id(mut self, case_id: CaseId) -> Self {
        self.case_id = case_id;
        self
    }

    /// Sets the patient name
    pub fn with_patient(mut self, name: impl Into<String>) -> Self {
        self.patient_name = name.into();
        self
    }

    /// Sets the clinical summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Replaces the diagnosis and procedure codes
    pub fn with_codes(mut self, icd10: &[&str], cpt: &[&str]) -> Self {
        self.icd10 = icd10.iter().map(|c| c.to_string()).collect();
        self.cpt = cpt.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Replaces the extracted evidence map
    pub fn with_evidence(mut self, evidence: Map<String, Value>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Sets a single extracted evidence flag
    pub fn with_evidence_flag(mut self, key: &str, present: bool) -> Self {
        self.evidence
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), Value::Bool(present));
        self
    }

    /// Sets the status directly, bypassing the pipeline
    pub fn with_status(mut self, status: CaseStatus) -> Self {
        self.status = status;
        self
    }

    /// Marks the case denied with the given reason
    pub fn denied(mut self, reason: impl Into<String>) -> Self {
        self.status = CaseStatus::Denied;
        self.denial_reason = Some(reason.into());
        self
    }

    /// Sets the creation time
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Builds the case
    pub fn build(self) -> Case {
        let mut case = Case::extracted(self.patient_name, self.diagnosis, self.icd10, self.cpt);
        case.case_id = self.case_id;
        case.summary = self.summary;
        case.evidence = self.evidence;
        case.status = self.status;
        case.denial_reason = self.denial_reason;
        if let Some(at) = self.created_at {
            case.created_at = at;
            case.updated_at = at;
        }
        case
    }
}
