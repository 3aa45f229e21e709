//! Curated procedure-code reference
//!
//! Procedure codes are licensed, so there is no public lookup service. This
//! table is the authoritative source; codes missing from it may still be
//! classified by the reasoning service at lower confidence.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// One curated procedure code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcedureEntry {
    pub description: &'static str,
    pub category: &'static str,
    pub requires_prior_auth: bool,
    pub typical_cost_range: Option<&'static str>,
}

const fn entry(description: &'static str, category: &'static str) -> ProcedureEntry {
    ProcedureEntry {
        description,
        category,
        requires_prior_auth: false,
        typical_cost_range: None,
    }
}

static PROCEDURES: Lazy<HashMap<&'static str, ProcedureEntry>> = Lazy::new(|| {
    HashMap::from([
        // Radiology - MRI
        (
            "73721",
            ProcedureEntry {
                typical_cost_range: Some("$500-$1500"),
                ..entry(
                    "Magnetic resonance (eg, proton) imaging, any joint of lower extremity; without contrast material",
                    "Radiology/MRI",
                )
            },
        ),
        ("73722", entry("Magnetic resonance imaging, joint of lower extremity, with contrast", "Radiology/MRI")),
        ("73723", entry("MRI joint of lower extremity, without contrast followed by with contrast", "Radiology/MRI")),
        ("70551", entry("MRI brain without contrast material", "Radiology/MRI")),
        ("70552", entry("MRI brain with contrast material", "Radiology/MRI")),
        ("72148", entry("MRI lumbar spine without contrast", "Radiology/MRI")),
        // Office visits
        ("99213", entry("Office or other outpatient visit, established patient, 20-29 minutes", "Evaluation & Management")),
        ("99214", entry("Office visit, established patient, 30-39 minutes", "Evaluation & Management")),
        // Surgery - orthopedics
        (
            "27447",
            ProcedureEntry {
                requires_prior_auth: true,
                ..entry("Total knee arthroplasty", "Surgery/Orthopedics")
            },
        ),
        (
            "29881",
            ProcedureEntry {
                requires_prior_auth: true,
                ..entry("Knee arthroscopy, surgical; with meniscectomy", "Surgery/Orthopedics")
            },
        ),
        // Consultations
        ("99241", entry("Office consultation, new patient, 15 minutes", "Consultation")),
        ("99242", entry("Office consultation, new patient, 30 minutes", "Consultation")),
    ])
});

/// Looks up a curated procedure code
pub fn curated(code: &str) -> Option<&'static ProcedureEntry> {
    PROCEDURES.get(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_lookup() {
        let knee_mri = curated("73721").unwrap();
        assert_eq!(knee_mri.category, "Radiology/MRI");
        assert_eq!(knee_mri.typical_cost_range, Some("$500-$1500"));

        assert!(curated("27447").unwrap().requires_prior_auth);
        assert!(!curated("99213").unwrap().requires_prior_auth);
    }

    #[test]
    fn test_unknown_code_is_absent() {
        assert!(curated("12345").is_none());
        assert!(curated("").is_none());
    }
}
