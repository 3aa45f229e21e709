//! Intake screen
//!
//! Rejects requests whose code lists are missing or ill-shaped before any
//! review runs.

use serde_json::Value;

use super::{DecisionMethod, PatientInfo, PayerDecision, PayerRequest, ProviderInfo};

pub const MISSING_REQUIRED_CODES: &str = "MISSING_REQUIRED_CODES";
pub const INVALID_CODES: &str = "INVALID_CODES";

/// ICD-10 codes are at least three characters
pub fn is_well_formed_diagnosis(code: &str) -> bool {
    code.chars().count() >= 3
}

/// CPT codes are four or five digits
pub fn is_well_formed_procedure(code: &str) -> bool {
    (4..=5).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit())
}

/// Screens typed code lists; `Some` is the denial
pub fn screen(diagnosis: &[String], procedures: &[String]) -> Option<PayerDecision> {
    if let Some(denial) = missing_codes(diagnosis.is_empty(), procedures.is_empty()) {
        return Some(denial);
    }

    let invalid: Vec<String> = diagnosis
        .iter()
        .filter(|c| !is_well_formed_diagnosis(c))
        .map(|c| format!("Invalid ICD-10: {c}"))
        .chain(
            procedures
                .iter()
                .filter(|c| !is_well_formed_procedure(c))
                .map(|c| format!("Invalid CPT: {c}")),
        )
        .collect();

    if invalid.is_empty() {
        None
    } else {
        Some(invalid_codes(&invalid))
    }
}

/// Decodes a raw payload into a request, denying ill-shaped code lists
///
/// Fields other than the code lists are decoded leniently; a malformed
/// evidence or provider block falls back to its default.
pub fn parse_payload(payload: Value) -> Result<PayerRequest, PayerDecision> {
    let diagnosis = code_list(payload.get("diagnosis"));
    let procedures = code_list(payload.get("procedures"));

    let missing_diagnosis = matches!(diagnosis, CodeList::Missing);
    let missing_procedures = matches!(procedures, CodeList::Missing);
    if let Some(denial) = missing_codes(missing_diagnosis, missing_procedures) {
        return Err(denial);
    }

    let (diagnosis, procedures) = match (diagnosis, procedures) {
        (CodeList::Codes(d), CodeList::Codes(p)) => (d, p),
        (d, p) => {
            let invalid: Vec<String> = d
                .rejects()
                .map(|v| format!("Invalid ICD-10: {v}"))
                .chain(p.rejects().map(|v| format!("Invalid CPT: {v}")))
                .collect();
            return Err(invalid_codes(&invalid));
        }
    };

    if let Some(denial) = screen(&diagnosis, &procedures) {
        return Err(denial);
    }

    Ok(PayerRequest {
        patient: field(&payload, "patient").unwrap_or_else(|| PatientInfo {
            name: String::new(),
            member_id: String::new(),
        }),
        diagnosis,
        procedures,
        clinical_summary: field(&payload, "clinical_summary").unwrap_or_default(),
        evidence: field(&payload, "evidence").unwrap_or_default(),
        provider: field::<ProviderInfo>(&payload, "provider").unwrap_or_default(),
    })
}

fn field<T: serde::de::DeserializeOwned>(payload: &Value, key: &str) -> Option<T> {
    payload
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

enum CodeList {
    Missing,
    Codes(Vec<String>),
    /// Present but not a list of strings; holds the offending values
    IllShaped(Vec<Value>),
}

impl CodeList {
    fn rejects(&self) -> impl Iterator<Item = &Value> {
        let values: &[Value] = match self {
            CodeList::IllShaped(values) => values,
            _ => &[],
        };
        values.iter()
    }
}

fn code_list(value: Option<&Value>) -> CodeList {
    match value {
        None | Some(Value::Null) => CodeList::Missing,
        Some(Value::Array(items)) if items.is_empty() => CodeList::Missing,
        Some(Value::String(s)) if s.is_empty() => CodeList::Missing,
        Some(Value::Array(items)) => {
            let rejects: Vec<Value> = items.iter().filter(|v| !v.is_string()).cloned().collect();
            if rejects.is_empty() {
                CodeList::Codes(
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                )
            } else {
                CodeList::IllShaped(rejects)
            }
        }
        Some(other) => CodeList::IllShaped(vec![other.clone()]),
    }
}

fn missing_codes(missing_diagnosis: bool, missing_procedures: bool) -> Option<PayerDecision> {
    let missing: Vec<&str> = [
        (missing_diagnosis, "ICD-10 diagnosis codes"),
        (missing_procedures, "CPT procedure codes"),
    ]
    .iter()
    .filter(|(absent, _)| *absent)
    .map(|(_, label)| *label)
    .collect();

    if missing.is_empty() {
        return None;
    }
    let missing = missing.join(", ");

    let mut denial = PayerDecision::deny(
        DecisionMethod::IntakeScreen,
        format!("Prior authorization denied due to missing required information: {missing}"),
        MISSING_REQUIRED_CODES,
    )
    .with_confidence("high")
    .with_next_steps(format!(
        "Please resubmit the request with valid {missing}. All prior authorization requests \
         must include proper ICD-10 diagnosis codes and CPT procedure codes."
    ));
    denial.medical_necessity =
        Some("Cannot assess medical necessity without proper diagnostic and procedure codes.".to_string());
    denial.clinical_guideline = Some("CMS Prior Authorization Requirements".to_string());
    Some(denial)
}

fn invalid_codes(invalid: &[String]) -> PayerDecision {
    let mut denial = PayerDecision::deny(
        DecisionMethod::IntakeScreen,
        format!(
            "Prior authorization denied due to invalid codes: {}. ICD-10 codes must be at least \
             3 characters, CPT codes must be 4-5 digits.",
            invalid.join(", ")
        ),
        INVALID_CODES,
    )
    .with_confidence("high")
    .with_next_steps("Please verify and resubmit with properly formatted ICD-10 and CPT codes.");
    denial.medical_necessity =
        Some("Cannot assess medical necessity with improperly formatted codes.".to_string());
    denial.clinical_guideline = Some("CMS Coding Standards".to_string());
    denial
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_shape_checks() {
        assert!(is_well_formed_diagnosis("M54"));
        assert!(!is_well_formed_diagnosis("M5"));
        assert!(is_well_formed_procedure("73721"));
        assert!(is_well_formed_procedure("0001"));
        assert!(!is_well_formed_procedure("737"));
        assert!(!is_well_formed_procedure("737210"));
        assert!(!is_well_formed_procedure("7372A"));
    }

    #[test]
    fn test_well_formed_request_passes() {
        assert!(screen(&codes(&["M25.561"]), &codes(&["73721"])).is_none());
    }

    #[test]
    fn test_missing_both_lists() {
        let denial = screen(&[], &[]).unwrap();
        assert_eq!(denial.denial_code.as_deref(), Some(MISSING_REQUIRED_CODES));
        assert_eq!(
            denial.reason.as_deref(),
            Some("Prior authorization denied due to missing required information: ICD-10 diagnosis codes, CPT procedure codes")
        );
        assert_eq!(denial.method, DecisionMethod::IntakeScreen);
    }

    #[test]
    fn test_invalid_codes_are_listed() {
        let denial = screen(&codes(&["M5"]), &codes(&["ABC"])).unwrap();
        assert_eq!(denial.denial_code.as_deref(), Some(INVALID_CODES));
        let reason = denial.reason.unwrap();
        assert!(reason.contains("Invalid ICD-10: M5"));
        assert!(reason.contains("Invalid CPT: ABC"));
    }

    #[test]
    fn test_payload_with_non_list_codes() {
        let denial = parse_payload(json!({"diagnosis": "M25.561", "procedures": ["73721"]})).unwrap_err();
        assert_eq!(denial.denial_code.as_deref(), Some(INVALID_CODES));
    }

    #[test]
    fn test_payload_with_non_string_code() {
        let denial = parse_payload(json!({"diagnosis": ["M25.561"], "procedures": [73721]})).unwrap_err();
        assert_eq!(denial.denial_code.as_deref(), Some(INVALID_CODES));
        assert!(denial.reason.unwrap().contains("Invalid CPT: 73721"));
    }

    #[test]
    fn test_payload_missing_procedures() {
        let denial = parse_payload(json!({"diagnosis": ["M25.561"], "procedures": []})).unwrap_err();
        assert_eq!(denial.denial_code.as_deref(), Some(MISSING_REQUIRED_CODES));
        assert!(!denial.reason.unwrap().contains("ICD-10"));
    }

    #[test]
    fn test_payload_lenient_on_other_fields() {
        let request = parse_payload(json!({
            "diagnosis": ["M25.561"],
            "procedures": ["73721"],
            "evidence": "yes please"
        }))
        .unwrap();
        assert_eq!(request.evidence, Default::default());
        assert_eq!(request.provider.name, "Demo Provider");
    }
}
