//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating codes and evidence flags.

use domain_authorization::EvidenceFlags;
use proptest::prelude::*;

/// Strategy for well-formed ICD-10 codes such as `M25.561`
pub fn icd10_strategy() -> impl Strategy<Value = String> {
    "[A-TV-Z][0-9]{2}(\\.[0-9A-Z]{1,4})?"
}

/// Strategy for well-formed five-digit CPT codes
pub fn cpt_strategy() -> impl Strategy<Value = String> {
    (10000u32..100000u32).prop_map(|n| n.to_string())
}

/// Strategy for non-empty code lists
pub fn code_list_strategy(
    code: impl Strategy<Value = String>,
) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(code, 1..4)
}

/// Strategy for arbitrary evidence flags
pub fn evidence_flags_strategy() -> impl Strategy<Value = EvidenceFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(pt_notes, clinical_notes, xray, referral)| EvidenceFlags {
            pt_notes,
            clinical_notes,
            xray,
            referral,
        },
    )
}
