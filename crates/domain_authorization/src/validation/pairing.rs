//! Diagnosis/procedure pairing assessment
//!
//! Each diagnosis x procedure combination is assessed in priority order:
//!
//! 1. Reasoning-service judgment, when both code descriptions are known
//! 2. Known pairings with fixed scores
//! 3. Ordered code-family rules
//! 4. Manual review with a neutral score

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Flag attached to pairings nobody could assess
pub const MANUAL_REVIEW_REQUIRED: &str = "MANUAL_REVIEW_REQUIRED";

/// How a pairing was assessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMethod {
    AiReasoning,
    KnownPairing,
    PatternMatching,
    Fallback,
}

/// Medical-necessity assessment of one diagnosis/procedure pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingAssessment {
    pub icd10: String,
    pub cpt: String,
    /// `None` when necessity could not be determined
    pub valid: Option<bool>,
    #[serde(with = "rust_decimal::serde::float")]
    pub score: Decimal,
    pub reasoning: String,
    pub method: PairingMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

impl PairingAssessment {
    pub fn needs_manual_review(&self) -> bool {
        self.flag.as_deref() == Some(MANUAL_REVIEW_REQUIRED)
    }
}

/// Predicate over a single code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePattern {
    Exact(&'static str),
    AnyPrefix(&'static [&'static str]),
}

impl CodePattern {
    pub fn matches(&self, code: &str) -> bool {
        match self {
            CodePattern::Exact(expected) => code == *expected,
            CodePattern::AnyPrefix(prefixes) => prefixes.iter().any(|p| code.starts_with(p)),
        }
    }
}

/// A code-family rule: when both patterns match, the pairing is plausible
#[derive(Debug, Clone)]
pub struct PairingRule {
    pub name: &'static str,
    pub diagnosis: CodePattern,
    pub procedure: CodePattern,
    pub score: Decimal,
    pub reasoning: &'static str,
}

impl PairingRule {
    pub fn matches(&self, icd10: &str, cpt: &str) -> bool {
        self.diagnosis.matches(icd10) && self.procedure.matches(cpt)
    }
}

struct KnownPairing {
    icd10: &'static str,
    cpt: &'static str,
    score: Decimal,
    reasoning: &'static str,
}

static KNOWN_PAIRINGS: Lazy<Vec<KnownPairing>> = Lazy::new(|| {
    vec![
        // Knee pain -> knee MRI
        KnownPairing {
            icd10: "M25.561",
            cpt: "73721",
            score: dec!(0.95),
            reasoning: "Right knee pain justifies right knee MRI imaging",
        },
        KnownPairing {
            icd10: "M25.562",
            cpt: "73721",
            score: dec!(0.95),
            reasoning: "Left knee pain justifies knee MRI imaging",
        },
        // Lumbar -> lumbar MRI
        KnownPairing {
            icd10: "M54.16",
            cpt: "72148",
            score: dec!(0.98),
            reasoning: "Lumbar radiculopathy justifies lumbar spine MRI",
        },
        KnownPairing {
            icd10: "M51.26",
            cpt: "72148",
            score: dec!(0.98),
            reasoning: "Disc displacement justifies lumbar MRI",
        },
        // Migraine -> brain MRI
        KnownPairing {
            icd10: "G43.909",
            cpt: "70551",
            score: dec!(0.85),
            reasoning: "Migraine may justify brain MRI based on clinical presentation",
        },
    ]
});

/// Code-family rules, evaluated in order; first match wins
pub static PAIRING_RULES: Lazy<Vec<PairingRule>> = Lazy::new(|| {
    vec![
        PairingRule {
            name: "joint_disorder_knee_mri",
            diagnosis: CodePattern::AnyPrefix(&["M25"]),
            procedure: CodePattern::Exact("73721"),
            score: dec!(0.80),
            reasoning: "Joint disorder may justify imaging based on clinical criteria",
        },
        PairingRule {
            name: "lumbar_pathology_lumbar_mri",
            diagnosis: CodePattern::AnyPrefix(&["M54", "M51"]),
            procedure: CodePattern::Exact("72148"),
            score: dec!(0.80),
            reasoning: "Lumbar pathology may justify lumbar spine MRI",
        },
        PairingRule {
            name: "neurological_brain_mri",
            diagnosis: CodePattern::AnyPrefix(&["G43", "G44"]),
            procedure: CodePattern::AnyPrefix(&["7055"]),
            score: dec!(0.75),
            reasoning: "Neurological symptoms may warrant brain imaging based on clinical presentation",
        },
    ]
});

/// Judgment requested from the reasoning service
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AiPairingJudgment {
    pub valid: Option<bool>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
}

impl AiPairingJudgment {
    pub(crate) fn into_assessment(self, icd10: &str, cpt: &str) -> PairingAssessment {
        let score = self
            .score
            .and_then(|s| Decimal::try_from(s).ok())
            .map(|s| s.clamp(Decimal::ZERO, Decimal::ONE).round_dp(2))
            .unwrap_or(dec!(0.50));
        PairingAssessment {
            icd10: icd10.to_string(),
            cpt: cpt.to_string(),
            valid: self.valid,
            score,
            reasoning: self
                .reasoning
                .unwrap_or_else(|| "AI-powered medical necessity assessment".to_string()),
            method: PairingMethod::AiReasoning,
            confidence: Some(self.confidence.unwrap_or_else(|| "medium".to_string())),
            flag: None,
        }
    }
}

pub(crate) fn pairing_prompt(icd10: &str, icd10_description: &str, cpt: &str, cpt_description: &str) -> String {
    format!(
        r#"You are a medical coding expert. Evaluate if this diagnosis medically justifies the proposed procedure.

Diagnosis Code: {icd10}
Diagnosis: {icd10_description}

Procedure Code: {cpt}
Procedure: {cpt_description}

Consider:
1. Does the diagnosis clinically justify the procedure?
2. Is this procedure appropriate for this condition?
3. What is the medical necessity score (0-100)?
4. What is your clinical reasoning?

Return ONLY a JSON object with this exact structure:
{{
  "valid": true or false,
  "score": 0.0 to 1.0,
  "reasoning": "brief clinical explanation in 1-2 sentences",
  "confidence": "high" or "medium" or "low"
}}"#
    )
}

/// Assesses a pair without the reasoning service
pub fn assess_offline(icd10: &str, cpt: &str) -> PairingAssessment {
    if let Some(known) = KNOWN_PAIRINGS.iter().find(|p| p.icd10 == icd10 && p.cpt == cpt) {
        return PairingAssessment {
            icd10: icd10.to_string(),
            cpt: cpt.to_string(),
            valid: Some(true),
            score: known.score,
            reasoning: known.reasoning.to_string(),
            method: PairingMethod::KnownPairing,
            confidence: None,
            flag: None,
        };
    }

    if let Some(rule) = PAIRING_RULES.iter().find(|r| r.matches(icd10, cpt)) {
        return PairingAssessment {
            icd10: icd10.to_string(),
            cpt: cpt.to_string(),
            valid: Some(true),
            score: rule.score,
            reasoning: rule.reasoning.to_string(),
            method: PairingMethod::PatternMatching,
            confidence: None,
            flag: None,
        };
    }

    PairingAssessment {
        icd10: icd10.to_string(),
        cpt: cpt.to_string(),
        valid: None,
        score: dec!(0.50),
        reasoning: "Unable to determine medical necessity automatically. Requires clinical review."
            .to_string(),
        method: PairingMethod::Fallback,
        confidence: None,
        flag: Some(MANUAL_REVIEW_REQUIRED.to_string()),
    }
}
