//! Evidence Step
//!
//! Determines which supporting documents a request needs from its procedure
//! codes and probes the blob store for each of them. The result is context
//! for the decision engine; it never halts the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use core_kernel::CaseId;

use crate::config::EvidenceConfig;
use crate::ports::BlobStore;

/// Document type required when a procedure has no specific requirements
pub const DEFAULT_DOCUMENT: &str = "clinical_notes";

static REQUIREMENTS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        // MRI knee / lower-extremity joint
        ("73721", &["pt_notes", "clinical_summary"][..]),
        ("73722", &["pt_notes", "clinical_summary"][..]),
        // MRI brain
        ("70551", &["clinical_notes", "referral"][..]),
        // Consultation
        ("99241", &["referral", "medical_records"][..]),
        // Knee replacement
        ("27447", &["xray", "pt_notes", "clinical_notes"][..]),
        // Arthroscopy
        ("29881", &["pt_notes", "mri_report"][..]),
    ])
});

/// Document types required for a set of procedure codes, de-duplicated in
/// first-seen order
pub fn required_documents(procedure_codes: &[String]) -> Vec<String> {
    let mut required: Vec<String> = Vec::new();
    for code in procedure_codes {
        let docs = REQUIREMENTS
            .get(code.as_str())
            .copied()
            .unwrap_or(&[DEFAULT_DOCUMENT][..]);
        for doc in docs {
            if !required.iter().any(|r| r.as_str() == *doc) {
                required.push((*doc).to_string());
            }
        }
    }
    required
}

/// Result of the Evidence Step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceReport {
    pub case_id: CaseId,
    pub required_docs: Vec<String>,
    pub found_docs: Vec<String>,
    pub missing_docs: Vec<String>,
    pub is_complete: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub completeness_percentage: Decimal,
    pub checked_at: DateTime<Utc>,
    pub has_sufficient_evidence: bool,
}

/// Percentage of required documents found, rounded to two decimals
pub fn completeness_percentage(found: usize, required: usize) -> Decimal {
    if required == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(found as u64) * Decimal::ONE_HUNDRED / Decimal::from(required as u64)).round_dp(2)
}

/// Evidence checking service
pub struct EvidenceStep {
    blobs: Arc<dyn BlobStore>,
    config: EvidenceConfig,
}

impl EvidenceStep {
    pub fn new(blobs: Arc<dyn BlobStore>, config: EvidenceConfig) -> Self {
        Self { blobs, config }
    }

    /// Checks that every required document exists for the case
    pub async fn check(&self, case_id: CaseId, procedure_codes: &[String]) -> EvidenceReport {
        let required_docs = required_documents(procedure_codes);
        let mut found_docs = Vec::new();
        let mut missing_docs = Vec::new();

        for doc in &required_docs {
            if self.document_exists(case_id, doc).await {
                found_docs.push(doc.clone());
            } else {
                missing_docs.push(doc.clone());
            }
        }

        let is_complete = missing_docs.is_empty();
        let completeness = completeness_percentage(found_docs.len(), required_docs.len());
        info!(
            case_id = %case_id,
            found = found_docs.len(),
            required = required_docs.len(),
            "Evidence check complete"
        );

        EvidenceReport {
            case_id,
            required_docs,
            found_docs,
            missing_docs,
            is_complete,
            completeness_percentage: completeness,
            checked_at: Utc::now(),
            has_sufficient_evidence: is_complete,
        }
    }

    /// Probes each configured extension in order; the first hit wins
    async fn document_exists(&self, case_id: CaseId, doc_type: &str) -> bool {
        for ext in &self.config.extensions {
            let path = self.config.document_path(case_id, doc_type, ext);
            match self.blobs.exists(&path).await {
                Ok(true) => {
                    debug!(path = %path, "Found evidence document");
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Evidence probe failed, treating as not found");
                }
            }
        }
        debug!(case_id = %case_id, doc_type, "Evidence document not found");
        false
    }
}
