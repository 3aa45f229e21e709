//! Validation Step
//!
//! Verifies and enriches diagnosis and procedure codes, then assesses every
//! diagnosis x procedure pairing for medical necessity.
//!
//! Only codes that are positively invalid make `all_valid` false. Codes the
//! reference service could not answer for, and pairings that need manual
//! review, are reported as warnings.

pub mod pairing;
pub mod procedures;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ReasoningConfig;
use crate::ports::{CodeReference, ReasoningService};
use crate::reasoning;

pub use pairing::{assess_offline, CodePattern, PairingAssessment, PairingMethod, PairingRule, MANUAL_REVIEW_REQUIRED};

/// Outcome for one code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeVerdict {
    Valid,
    Invalid,
    Unknown,
}

/// Validation record for one code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeValidation {
    pub code: String,
    /// `None` when validity could not be determined
    pub valid: Option<bool>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_prior_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typical_cost_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CodeValidation {
    fn bare(code: &str) -> Self {
        Self {
            code: code.to_string(),
            valid: None,
            description: None,
            category: None,
            billable: None,
            requires_prior_auth: None,
            typical_cost_range: None,
            confidence: None,
            source: None,
            note: None,
            error: None,
        }
    }

    pub fn verdict(&self) -> CodeVerdict {
        match self.valid {
            Some(true) => CodeVerdict::Valid,
            Some(false) => CodeVerdict::Invalid,
            None => CodeVerdict::Unknown,
        }
    }
}

/// Aggregated result of the Validation Step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validation_timestamp: DateTime<Utc>,
    pub icd10_validations: Vec<CodeValidation>,
    pub cpt_validations: Vec<CodeValidation>,
    pub code_pairings: Vec<PairingAssessment>,
    pub all_valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Set when validation could not be performed at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    /// True when the pipeline must stop at this step
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || !self.all_valid
    }

    /// Message describing why validation failed
    pub fn failure_message(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        if self.errors.is_empty() {
            "Validation failed".to_string()
        } else {
            self.errors.join(", ")
        }
    }
}

/// Judgment requested for a procedure code missing from the curated table
#[derive(Debug, Deserialize)]
struct AiProcedureJudgment {
    valid: Option<bool>,
    description: Option<String>,
    category: Option<String>,
    billable: Option<bool>,
    confidence: Option<String>,
}

/// Code validation service
pub struct ValidationStep {
    codes: Arc<dyn CodeReference>,
    reasoning: Option<Arc<dyn ReasoningService>>,
    config: ReasoningConfig,
}

impl ValidationStep {
    pub fn new(
        codes: Arc<dyn CodeReference>,
        reasoning: Option<Arc<dyn ReasoningService>>,
        config: ReasoningConfig,
    ) -> Self {
        Self { codes, reasoning, config }
    }

    /// Validates all codes and their pairings
    pub async fn validate(&self, icd10: &[String], cpt: &[String]) -> ValidationReport {
        let mut report = ValidationReport {
            validation_timestamp: Utc::now(),
            icd10_validations: Vec::with_capacity(icd10.len()),
            cpt_validations: Vec::with_capacity(cpt.len()),
            code_pairings: Vec::with_capacity(icd10.len() * cpt.len()),
            all_valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            error: None,
        };

        if icd10.is_empty() && cpt.is_empty() {
            report.error = Some("No codes to validate".to_string());
            return report;
        }

        for code in icd10 {
            let validation = self.validate_diagnosis(code).await;
            match validation.verdict() {
                CodeVerdict::Invalid => {
                    report.all_valid = false;
                    report.errors.push(format!("Invalid ICD-10 code: {}", code));
                }
                CodeVerdict::Unknown => {
                    report.warnings.push(format!("Could not validate ICD-10 code: {}", code));
                }
                CodeVerdict::Valid => {}
            }
            report.icd10_validations.push(validation);
        }

        for code in cpt {
            let validation = self.validate_procedure(code).await;
            if validation.verdict() != CodeVerdict::Valid {
                report.all_valid = false;
                report.errors.push(format!("Invalid CPT code: {}", code));
            }
            report.cpt_validations.push(validation);
        }

        let descriptions: HashMap<&str, &str> = report
            .icd10_validations
            .iter()
            .chain(report.cpt_validations.iter())
            .filter_map(|v| v.description.as_deref().map(|d| (v.code.as_str(), d)))
            .collect();

        let mut pairings = Vec::with_capacity(icd10.len() * cpt.len());
        for dx in icd10 {
            for px in cpt {
                let pairing = self
                    .assess_pairing(dx, px, descriptions.get(dx.as_str()).copied(), descriptions.get(px.as_str()).copied())
                    .await;
                if pairing.needs_manual_review() {
                    report
                        .warnings
                        .push(format!("Medical necessity unclear for {} -> {}", dx, px));
                }
                pairings.push(pairing);
            }
        }
        report.code_pairings = pairings;

        info!(
            all_valid = report.all_valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Code validation complete"
        );
        report
    }

    /// Looks up one diagnosis code
    pub async fn validate_diagnosis(&self, code: &str) -> CodeValidation {
        let mut validation = CodeValidation::bare(code);
        match self.codes.lookup(code).await {
            Ok(lookup) => {
                validation.valid = Some(lookup.valid);
                validation.description = lookup.description;
                validation.billable = Some(lookup.valid);
                validation.source = Some(lookup.source);
                if !lookup.valid {
                    validation.error = Some("Code not found in ICD-10 database".to_string());
                }
            }
            Err(e) => {
                warn!(code, error = %e, "Diagnosis code lookup failed");
                validation.error = Some(format!("Validation error: {}", e));
            }
        }
        validation
    }

    /// Validates one procedure code against the curated table, falling back
    /// to an AI classification
    pub async fn validate_procedure(&self, code: &str) -> CodeValidation {
        let mut validation = CodeValidation::bare(code);

        if let Some(entry) = procedures::curated(code) {
            validation.valid = Some(true);
            validation.description = Some(entry.description.to_string());
            validation.category = Some(entry.category.to_string());
            validation.billable = Some(true);
            validation.requires_prior_auth = Some(entry.requires_prior_auth);
            validation.typical_cost_range = entry.typical_cost_range.map(str::to_owned);
            validation.source = Some("CPT Reference Database (Official)".to_string());
            return validation;
        }

        let prompt = procedure_prompt(code);
        match reasoning::judge::<AiProcedureJudgment>(
            self.reasoning.as_deref(),
            &prompt,
            self.config.procedure_classification,
        )
        .await
        {
            Ok(judgment) => {
                debug!(code, "Procedure code classified by reasoning service");
                validation.valid = Some(judgment.valid.unwrap_or(false));
                validation.description = judgment.description;
                validation.category = judgment.category;
                validation.billable = Some(judgment.billable.unwrap_or(true));
                validation.confidence = Some(judgment.confidence.unwrap_or_else(|| "medium".to_string()));
                validation.source = Some("AI Reasoning".to_string());
                validation.note = Some("AI-validated (not from official AMA database)".to_string());
            }
            Err(failure) => {
                warn!(code, reason = %failure, "Procedure code classification unavailable");
                validation.valid = Some(false);
                validation.error = Some(
                    "CPT code not found in reference database and AI validation unavailable".to_string(),
                );
            }
        }
        validation
    }

    /// Assesses one diagnosis/procedure pairing
    pub async fn assess_pairing(
        &self,
        icd10: &str,
        cpt: &str,
        icd10_description: Option<&str>,
        cpt_description: Option<&str>,
    ) -> PairingAssessment {
        if let (Some(dx_desc), Some(px_desc)) = (icd10_description, cpt_description) {
            let prompt = pairing::pairing_prompt(icd10, dx_desc, cpt, px_desc);
            match reasoning::judge::<pairing::AiPairingJudgment>(
                self.reasoning.as_deref(),
                &prompt,
                self.config.pairing_judgment,
            )
            .await
            {
                Ok(judgment) => return judgment.into_assessment(icd10, cpt),
                Err(failure) => {
                    debug!(icd10, cpt, reason = %failure, "AI pairing judgment unavailable, using tables");
                }
            }
        }
        assess_offline(icd10, cpt)
    }
}

fn procedure_prompt(code: &str) -> String {
    format!(
        r#"You are a medical billing expert. Analyze this CPT procedure code.

CPT Code: {code}

Provide:
1. Is this a valid CPT code format? (5 digits)
2. What procedure does this code likely represent?
3. What medical category (e.g., Radiology, Surgery, E&M)?
4. Is this typically a billable code?

Return ONLY a JSON object:
{{
  "valid": true or false,
  "description": "procedure description",
  "category": "category name",
  "billable": true or false,
  "confidence": "high" or "medium" or "low"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockCodeReference, MockReasoningService};
    use rust_decimal_macros::dec;

    fn step(codes: MockCodeReference, reasoning: Option<MockReasoningService>) -> ValidationStep {
        ValidationStep::new(
            Arc::new(codes),
            reasoning.map(|r| Arc::new(r) as Arc<dyn ReasoningService>),
            ReasoningConfig::default(),
        )
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_all_known_codes_are_valid() {
        let reference = MockCodeReference::new().with_code("M54.16", "Radiculopathy, lumbar region");
        let report = step(reference, None).validate(&codes(&["M54.16"]), &codes(&["72148"])).await;

        assert!(report.all_valid);
        assert!(!report.is_failure());
        assert_eq!(report.icd10_validations[0].description.as_deref(), Some("Radiculopathy, lumbar region"));
        assert_eq!(report.cpt_validations[0].category.as_deref(), Some("Radiology/MRI"));
        assert_eq!(report.code_pairings.len(), 1);
    }

    #[tokio::test]
    async fn test_curated_procedure_carries_reference_details() {
        let step = step(MockCodeReference::new(), None);

        let knee_mri = step.validate_procedure("73721").await;
        assert_eq!(knee_mri.requires_prior_auth, Some(false));
        assert_eq!(knee_mri.typical_cost_range.as_deref(), Some("$500-$1500"));

        let arthroplasty = step.validate_procedure("27447").await;
        assert_eq!(arthroplasty.requires_prior_auth, Some(true));
        assert!(arthroplasty.typical_cost_range.is_none());
    }

    #[tokio::test]
    async fn test_pairing_uses_known_table_when_reasoning_unavailable() {
        let reference = MockCodeReference::new().with_code("M54.16", "Radiculopathy, lumbar region");
        let report = step(reference, Some(MockReasoningService::unavailable()))
            .validate(&codes(&["M54.16"]), &codes(&["72148"]))
            .await;

        let pairing = &report.code_pairings[0];
        assert_eq!(pairing.valid, Some(true));
        assert_eq!(pairing.score, dec!(0.98));
        assert_eq!(pairing.method, PairingMethod::KnownPairing);
    }

    #[tokio::test]
    async fn test_pairing_prefers_ai_judgment() {
        let reference = MockCodeReference::new().with_code("M25.561", "Pain in right knee");
        let reasoning = MockReasoningService::unavailable().respond_when(
            "Diagnosis Code: M25.561",
            r#"```json
{"valid": true, "score": 0.91, "reasoning": "Knee pain supports knee MRI", "confidence": "high"}
```"#,
        );
        let report = step(reference, Some(reasoning))
            .validate(&codes(&["M25.561"]), &codes(&["73721"]))
            .await;

        let pairing = &report.code_pairings[0];
        assert_eq!(pairing.method, PairingMethod::AiReasoning);
        assert_eq!(pairing.score, dec!(0.91));
        assert_eq!(pairing.confidence.as_deref(), Some("high"));
    }

    #[tokio::test]
    async fn test_unknown_diagnosis_is_warning_not_failure() {
        let reference = MockCodeReference::new().failing_on("M25.561");
        let report = step(reference, None).validate(&codes(&["M25.561"]), &codes(&["73721"])).await;

        assert!(report.all_valid);
        assert_eq!(report.icd10_validations[0].verdict(), CodeVerdict::Unknown);
        assert!(report.warnings.iter().any(|w| w.contains("Could not validate ICD-10 code: M25.561")));
    }

    #[tokio::test]
    async fn test_lookup_not_found_error_is_unknown() {
        let reference = MockCodeReference::new().not_found_on("M25.561");
        let report = step(reference, None).validate(&codes(&["M25.561"]), &codes(&["73721"])).await;

        assert!(report.all_valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.icd10_validations[0].valid, None);
    }

    #[tokio::test]
    async fn test_missing_diagnosis_is_invalid() {
        let report = step(MockCodeReference::new(), None)
            .validate(&codes(&["XYZ.99"]), &codes(&["73721"]))
            .await;

        assert!(!report.all_valid);
        assert!(report.is_failure());
        assert_eq!(report.failure_message(), "Invalid ICD-10 code: XYZ.99");
    }

    #[tokio::test]
    async fn test_uncurated_procedure_without_reasoning_is_invalid() {
        let reference = MockCodeReference::new().with_code("M25.561", "Pain in right knee");
        let report = step(reference, None).validate(&codes(&["M25.561"]), &codes(&["12345"])).await;

        assert!(!report.all_valid);
        let cpt = &report.cpt_validations[0];
        assert_eq!(cpt.valid, Some(false));
        assert!(cpt.error.as_deref().unwrap().contains("AI validation unavailable"));
    }

    #[tokio::test]
    async fn test_uncurated_procedure_classified_by_ai() {
        let reference = MockCodeReference::new().with_code("M17.11", "Primary osteoarthritis, right knee");
        let reasoning = MockReasoningService::unavailable().respond_when(
            "CPT Code: 27486",
            r#"{"valid": true, "description": "Revision of total knee arthroplasty", "category": "Surgery/Orthopedics", "billable": true, "confidence": "medium"}"#,
        );
        let report = step(reference, Some(reasoning))
            .validate(&codes(&["M17.11"]), &codes(&["27486"]))
            .await;

        assert!(report.all_valid);
        let cpt = &report.cpt_validations[0];
        assert_eq!(cpt.source.as_deref(), Some("AI Reasoning"));
        assert!(cpt.note.as_deref().unwrap().contains("AI-validated"));
    }

    #[tokio::test]
    async fn test_unresolved_pairing_is_recorded_with_warning() {
        let reference = MockCodeReference::new().with_code("E11.9", "Type 2 diabetes mellitus without complications");
        let report = step(reference, None).validate(&codes(&["E11.9"]), &codes(&["27447"])).await;

        assert!(report.all_valid);
        assert!(report.code_pairings[0].needs_manual_review());
        assert!(report.warnings.iter().any(|w| w.contains("E11.9 -> 27447")));
    }

    #[tokio::test]
    async fn test_every_pair_is_recorded() {
        let reference = MockCodeReference::new()
            .with_code("M25.561", "Pain in right knee")
            .with_code("M54.16", "Radiculopathy, lumbar region");
        let report = step(reference, None)
            .validate(&codes(&["M25.561", "M54.16"]), &codes(&["73721", "72148"]))
            .await;

        assert_eq!(report.code_pairings.len(), 4);
    }

    #[tokio::test]
    async fn test_no_codes_is_explicit_error() {
        let report = step(MockCodeReference::new(), None).validate(&[], &[]).await;
        assert!(report.is_failure());
        assert_eq!(report.failure_message(), "No codes to validate");
    }
}
