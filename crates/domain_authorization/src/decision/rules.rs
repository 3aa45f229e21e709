//! Deterministic fallback rules
//!
//! Evaluated in table order when the AI review is unavailable. The first
//! rule that applies denies the request; a request no rule applies to is
//! approved.

use super::{DecisionMethod, PayerDecision, PayerRequest};

/// Headache, low back pain and shoulder pain, unspecified
const NON_SPECIFIC_DIAGNOSES: &[&str] = &["R51.9", "M54.5", "M25.511"];

const IMAGING_PROCEDURES: &[&str] = &[
    "73721", "73722", "73723", "70551", "70552", "70553", "72148", "73221",
];

const SPECIALTY_CONSULTS: &[&str] = &["99241", "99242", "99243"];

/// Joint replacement
const HIGH_COST_PROCEDURES: &[&str] = &["27447", "27486"];

/// Denial produced by a fallback rule
#[derive(Debug)]
pub struct RuleDenial {
    pub denial_code: &'static str,
    pub reason: &'static str,
    pub required_documents: &'static [&'static str],
    pub next_steps: Option<&'static str>,
}

/// One entry of the fallback table
pub struct FallbackRule {
    pub name: &'static str,
    pub applies: fn(&PayerRequest) -> bool,
    pub denial: RuleDenial,
}

fn any_code(codes: &[String], set: &[&str]) -> bool {
    codes.iter().any(|c| set.contains(&c.as_str()))
}

fn missing_codes(r: &PayerRequest) -> bool {
    r.diagnosis.is_empty() || r.procedures.is_empty()
}

fn non_specific_without_conservative_treatment(r: &PayerRequest) -> bool {
    any_code(&r.diagnosis, NON_SPECIFIC_DIAGNOSES) && !r.evidence.pt_notes
}

fn sprain_with_arthroscopy(r: &PayerRequest) -> bool {
    any_code(&r.diagnosis, &["S93.401A"]) && any_code(&r.procedures, &["29891"])
}

fn imaging_without_pt_notes(r: &PayerRequest) -> bool {
    any_code(&r.procedures, IMAGING_PROCEDURES) && !r.evidence.pt_notes
}

fn consult_without_referral(r: &PayerRequest) -> bool {
    any_code(&r.procedures, SPECIALTY_CONSULTS) && !r.evidence.referral
}

fn high_cost_without_workup(r: &PayerRequest) -> bool {
    any_code(&r.procedures, HIGH_COST_PROCEDURES) && !(r.evidence.xray && r.evidence.clinical_notes)
}

/// Fallback rules in priority order
pub static FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule {
        name: "missing_codes",
        applies: missing_codes,
        denial: RuleDenial {
            denial_code: "MISSING_DIAGNOSIS_004",
            reason: "Missing diagnosis/procedure codes",
            required_documents: &["diagnosis"],
            next_steps: None,
        },
    },
    FallbackRule {
        name: "non_specific_diagnosis",
        applies: non_specific_without_conservative_treatment,
        denial: RuleDenial {
            denial_code: "MEDICAL_NECESSITY_005",
            reason: "Insufficient medical necessity: Non-specific diagnosis without documentation of \
                     conservative treatment failure or red flag symptoms",
            required_documents: &[
                "Documentation of 6-8 weeks conservative treatment failure",
                "Physical therapy notes",
                "Medication trial records",
                "Evidence of progressive symptoms or functional limitations",
            ],
            next_steps: Some("Complete conservative treatment protocol and resubmit with documented treatment failure"),
        },
    },
    FallbackRule {
        name: "inappropriate_procedure",
        applies: sprain_with_arthroscopy,
        denial: RuleDenial {
            denial_code: "INAPPROPRIATE_PROCEDURE_006",
            reason: "Procedure not medically necessary: Arthroscopic surgery not indicated for Grade 1 ankle sprain",
            required_documents: &[
                "Evidence of Grade 3 ligament tear",
                "Chronic instability documented with stress testing",
                "Failed 3-6 months conservative treatment including physical therapy",
            ],
            next_steps: Some("Grade 1 ankle sprains require RICE protocol and physical therapy, not surgery"),
        },
    },
    FallbackRule {
        name: "imaging_requires_pt_notes",
        applies: imaging_without_pt_notes,
        denial: RuleDenial {
            denial_code: "INSUFFICIENT_EVIDENCE_001",
            reason: "Missing required documentation: Physical Therapy notes showing 6 weeks of conservative treatment",
            required_documents: &[
                "Physical therapy notes with treatment dates and progress",
                "Documentation of failed conservative management",
            ],
            next_steps: Some(
                "Complete 6 weeks of physical therapy and resubmit with PT notes documenting treatment failure",
            ),
        },
    },
    FallbackRule {
        name: "consult_requires_referral",
        applies: consult_without_referral,
        denial: RuleDenial {
            denial_code: "MISSING_REFERRAL_002",
            reason: "Missing required documentation: Primary care physician referral",
            required_documents: &["referral"],
            next_steps: None,
        },
    },
    FallbackRule {
        name: "high_cost_requires_workup",
        applies: high_cost_without_workup,
        denial: RuleDenial {
            denial_code: "INSUFFICIENT_MEDICAL_NECESSITY_003",
            reason: "Missing required documentation: X-ray reports and detailed clinical notes",
            required_documents: &["xray", "clinical_notes"],
            next_steps: None,
        },
    },
];

/// First rule that applies to the request
pub fn first_match(request: &PayerRequest) -> Option<&'static FallbackRule> {
    FALLBACK_RULES.iter().find(|rule| (rule.applies)(request))
}

/// Applies the fallback table
pub fn evaluate(request: &PayerRequest) -> PayerDecision {
    match first_match(request) {
        Some(rule) => {
            tracing::debug!(rule = rule.name, "Fallback rule matched");
            let denial = PayerDecision::deny(DecisionMethod::RuleFallback, rule.denial.reason, rule.denial.denial_code)
                .with_required_documents(rule.denial.required_documents.iter().copied());
            match rule.denial.next_steps {
                Some(steps) => denial.with_next_steps(steps),
                None => denial,
            }
        }
        None => PayerDecision::approve(DecisionMethod::RuleFallback, &request.procedures),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::EvidenceFlags;
    use crate::decision::{DecisionStatus, PatientInfo, ProviderInfo};

    fn request(diagnosis: &[&str], procedures: &[&str], evidence: EvidenceFlags) -> PayerRequest {
        PayerRequest {
            patient: PatientInfo {
                name: "Test Patient".into(),
                member_id: "00000000".into(),
            },
            diagnosis: diagnosis.iter().map(|c| c.to_string()).collect(),
            procedures: procedures.iter().map(|c| c.to_string()).collect(),
            clinical_summary: String::new(),
            evidence,
            provider: ProviderInfo::default(),
        }
    }

    fn all_evidence() -> EvidenceFlags {
        EvidenceFlags {
            pt_notes: true,
            clinical_notes: true,
            xray: true,
            referral: true,
        }
    }

    fn code_of(decision: &PayerDecision) -> Option<&str> {
        decision.denial_code.as_deref()
    }

    #[test]
    fn test_missing_codes_wins_over_everything() {
        let decision = evaluate(&request(&[], &["73721"], EvidenceFlags::default()));
        assert_eq!(code_of(&decision), Some("MISSING_DIAGNOSIS_004"));

        let decision = evaluate(&request(&["M54.5"], &[], EvidenceFlags::default()));
        assert_eq!(code_of(&decision), Some("MISSING_DIAGNOSIS_004"));
    }

    #[test]
    fn test_non_specific_diagnosis_requires_conservative_treatment() {
        let decision = evaluate(&request(&["M54.5"], &["72148"], EvidenceFlags::default()));
        assert_eq!(code_of(&decision), Some("MEDICAL_NECESSITY_005"));
        assert!(decision.required_documents.iter().any(|d| d == "Physical therapy notes"));
        assert!(decision.required_documents.iter().any(|d| d == "Medication trial records"));
    }

    #[test]
    fn test_non_specific_diagnosis_with_pt_notes_is_not_rule_two() {
        let evidence = EvidenceFlags { pt_notes: true, ..Default::default() };
        let decision = evaluate(&request(&["M54.5"], &["72148"], evidence));
        assert!(decision.is_approved());
    }

    #[test]
    fn test_sprain_arthroscopy_denied_even_with_full_evidence() {
        let decision = evaluate(&request(&["S93.401A"], &["29891"], all_evidence()));
        assert_eq!(code_of(&decision), Some("INAPPROPRIATE_PROCEDURE_006"));
    }

    #[test]
    fn test_imaging_requires_pt_notes() {
        let decision = evaluate(&request(&["M25.561"], &["73721"], EvidenceFlags::default()));
        assert_eq!(code_of(&decision), Some("INSUFFICIENT_EVIDENCE_001"));
        assert!(decision.next_steps.is_some());
    }

    #[test]
    fn test_consult_requires_referral() {
        let decision = evaluate(&request(&["M25.561"], &["99242"], EvidenceFlags::default()));
        assert_eq!(code_of(&decision), Some("MISSING_REFERRAL_002"));
        assert_eq!(decision.required_documents, vec!["referral"]);
    }

    #[test]
    fn test_high_cost_requires_xray_and_notes() {
        let evidence = EvidenceFlags { xray: true, ..Default::default() };
        let decision = evaluate(&request(&["M17.11"], &["27447"], evidence));
        assert_eq!(code_of(&decision), Some("INSUFFICIENT_MEDICAL_NECESSITY_003"));

        let evidence = EvidenceFlags { xray: true, clinical_notes: true, ..Default::default() };
        assert!(evaluate(&request(&["M17.11"], &["27447"], evidence)).is_approved());
    }

    #[test]
    fn test_codes_match_exactly() {
        // M54.50 is not the non-specific M54.5
        let evidence = EvidenceFlags { pt_notes: true, ..Default::default() };
        assert!(first_match(&request(&["M54.50"], &["99213"], evidence)).is_none());
    }

    #[test]
    fn test_approval_lists_procedures() {
        let decision = evaluate(&request(&["M25.561"], &["73721"], all_evidence()));
        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.approved_procedures, vec!["73721"]);
        assert!(decision.authorization_number.is_some());
        assert!(decision.reason.is_none());
    }

    #[test]
    fn test_rule_names_are_unique() {
        let mut names: Vec<_> = FALLBACK_RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FALLBACK_RULES.len());
    }
}
