//! Pre-built Test Fixtures
//!
//! Provides ready-to-use codes, evidence maps and reasoning-service replies.
//! These fixtures are designed to be consistent and predictable for tests.

use core_kernel::CaseId;
use domain_authorization::EvidenceConfig;
use domain_authorization::ports::mock::{MockBlobStore, MockCodeReference, MockReasoningService};
use serde_json::{json, Map, Value};

/// Prompt fragment identifying the medical-necessity review
pub const REVIEW_PROMPT: &str = "medical necessity reviewer";

/// Prompt fragment identifying a diagnosis/procedure pairing judgment
pub const PAIRING_PROMPT: &str = "medical coding expert";

/// Prompt fragment identifying a procedure-code classification
pub const PROCEDURE_PROMPT: &str = "medical billing expert";

/// Fixture for diagnosis and procedure codes
pub struct CodeFixtures;

impl CodeFixtures {
    /// Pain in right knee
    pub fn knee_pain() -> &'static str {
        "M25.561"
    }

    /// Low back pain, unspecified
    pub fn low_back_pain() -> &'static str {
        "M54.5"
    }

    /// Sprain of unspecified ligament of right ankle
    pub fn ankle_sprain() -> &'static str {
        "S93.401A"
    }

    /// MRI lower extremity joint without contrast
    pub fn knee_mri() -> &'static str {
        "73721"
    }

    /// MRI lumbar spine without contrast
    pub fn lumbar_mri() -> &'static str {
        "72148"
    }

    /// Ankle arthroscopy
    pub fn ankle_arthroscopy() -> &'static str {
        "29891"
    }

    /// Total knee arthroplasty
    pub fn knee_replacement() -> &'static str {
        "27447"
    }

    /// A code reference that knows every diagnosis fixture
    pub fn code_reference() -> MockCodeReference {
        MockCodeReference::new()
            .with_code("M25.561", "Pain in right knee")
            .with_code("M54.5", "Low back pain")
            .with_code("M17.11", "Unilateral primary osteoarthritis, right knee")
            .with_code("S93.401A", "Sprain of unspecified ligament of right ankle, initial encounter")
            .with_code("R51.9", "Headache, unspecified")
    }
}

/// Fixture for extracted evidence maps
pub struct EvidenceFixtures;

impl EvidenceFixtures {
    /// No documentation beyond the clinical note
    pub fn none() -> Map<String, Value> {
        Map::new()
    }

    /// Physical therapy notes attached
    pub fn pt_notes() -> Map<String, Value> {
        flags(json!({ "pt_notes": true }))
    }

    /// Every supporting document attached
    pub fn complete() -> Map<String, Value> {
        flags(json!({
            "pt_notes": true,
            "clinical_notes": true,
            "xray": true,
            "referral": true,
        }))
    }

    /// A blob store holding the given documents, as PDFs, for a case
    pub async fn blobs_for(case_id: CaseId, documents: &[&str]) -> MockBlobStore {
        let config = EvidenceConfig::default();
        MockBlobStore::with_paths(
            documents
                .iter()
                .map(|doc| config.document_path(case_id, doc, ".pdf")),
        )
        .await
    }
}

fn flags(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Fixture for reasoning-service replies
pub struct ReasoningFixtures;

impl ReasoningFixtures {
    /// An approval wrapped in a code fence
    pub fn approval() -> String {
        "```json\n{\"decision\": \"APPROVED\", \"confidence\": \"high\", \
         \"reasoning\": \"Documented failure of six weeks of physical therapy.\", \
         \"medical_necessity\": \"Met\", \"code_appropriateness\": \"Appropriate\"}\n```"
            .to_string()
    }

    /// A denial listing required actions
    pub fn denial() -> String {
        json!({
            "decision": "DENIED",
            "confidence": "medium",
            "reasoning": "Conservative treatment not documented.",
            "missing_elements": ["Physical therapy notes"],
            "required_actions": ["Complete 6 weeks of physical therapy", "Resubmit with PT notes"],
        })
        .to_string()
    }

    /// Prose that contains no JSON object
    pub fn garbled() -> String {
        "I believe this request should probably be approved.".to_string()
    }

    /// A pairing judgment that supports the procedure
    pub fn supported_pairing() -> String {
        json!({
            "valid": true,
            "score": 0.85,
            "reasoning": "Diagnosis supports the procedure.",
            "confidence": "high",
        })
        .to_string()
    }

    /// A reasoning service that approves every review and supports every pairing
    pub fn approving_service() -> MockReasoningService {
        MockReasoningService::unavailable()
            .respond_when(REVIEW_PROMPT, Self::approval())
            .respond_when(PAIRING_PROMPT, Self::supported_pairing())
    }

    /// A reasoning service that denies every review
    pub fn denying_service() -> MockReasoningService {
        MockReasoningService::unavailable()
            .respond_when(REVIEW_PROMPT, Self::denial())
            .respond_when(PAIRING_PROMPT, Self::supported_pairing())
    }
}
