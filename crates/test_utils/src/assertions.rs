//! Custom Test Assertions
//!
//! Provides assertion helpers for case records that give more meaningful
//! failure messages than standard assertions.

use domain_authorization::{Case, CaseStatus, TimelineTag};

/// Asserts the invariants every stored case must satisfy
///
/// - an approved case carries an authorization number and no denial reason
/// - a denied case carries a denial reason and no authorization number
/// - timeline timestamps never go backwards
///
/// # Panics
///
/// Panics with a description of the first violated invariant
pub fn assert_case_invariants(case: &Case) {
    match case.status {
        CaseStatus::Approved => {
            assert!(
                case.authorization_number.is_some(),
                "Approved case {} has no authorization number",
                case.case_id
            );
            assert!(
                case.denial_reason.is_none(),
                "Approved case {} carries denial reason {:?}",
                case.case_id,
                case.denial_reason
            );
        }
        CaseStatus::Denied => {
            assert!(
                case.denial_reason.is_some(),
                "Denied case {} has no denial reason",
                case.case_id
            );
            assert!(
                case.authorization_number.is_none(),
                "Denied case {} carries authorization number {:?}",
                case.case_id,
                case.authorization_number
            );
        }
        _ => {}
    }

    for pair in case.timeline.windows(2) {
        assert!(
            pair[0].timestamp <= pair[1].timestamp,
            "Timeline of case {} goes backwards: '{}' at {} precedes '{}' at {}",
            case.case_id,
            pair[0].event,
            pair[0].timestamp,
            pair[1].event,
            pair[1].timestamp
        );
    }
}

/// Asserts that some timeline event contains `fragment` with the given tag
pub fn assert_timeline_contains(case: &Case, fragment: &str, tag: TimelineTag) {
    assert!(
        case.timeline
            .iter()
            .any(|e| e.status == tag && e.event.contains(fragment)),
        "No {:?} event containing '{}' in timeline of case {}: {:?}",
        tag,
        fragment,
        case.case_id,
        case.timeline.iter().map(|e| e.event.as_str()).collect::<Vec<_>>()
    );
}

/// Asserts the case reached the expected status
pub fn assert_status(case: &Case, expected: CaseStatus) {
    assert_eq!(
        case.status, expected,
        "Case {} has status {} (error: {:?}, denial: {:?})",
        case.case_id, case.status, case.error, case.denial_reason
    );
}
