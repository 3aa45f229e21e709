//! Case statistics

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::case::{Case, CaseStatus};

/// A denial reason and how often it occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Aggregate view over a set of cases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStatistics {
    pub total_cases: usize,
    pub approved: usize,
    pub denied: usize,
    pub pending: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub approval_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub completion_rate: Decimal,
    pub top_denial_reasons: Vec<DenialReasonCount>,
}

fn percentage(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part as u64) * Decimal::ONE_HUNDRED / Decimal::from(whole as u64)).round_dp(1)
}

impl CaseStatistics {
    pub fn from_cases(cases: &[Case]) -> Self {
        let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();
        let approved = count(CaseStatus::Approved);
        let denied = count(CaseStatus::Denied);
        let pending = cases
            .iter()
            .filter(|c| matches!(c.status, CaseStatus::Extracted | CaseStatus::Processing))
            .count();
        let decided = approved + denied;

        let mut reasons: HashMap<&str, usize> = HashMap::new();
        for case in cases.iter().filter(|c| c.status == CaseStatus::Denied) {
            let reason = case.denial_reason.as_deref().unwrap_or("Unknown");
            *reasons.entry(reason).or_default() += 1;
        }
        let mut top: Vec<DenialReasonCount> = reasons
            .into_iter()
            .map(|(reason, count)| DenialReasonCount {
                reason: reason.to_string(),
                count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        top.truncate(5);

        Self {
            total_cases: cases.len(),
            approved,
            denied,
            pending,
            approval_rate: percentage(approved, decided),
            completion_rate: percentage(decided, cases.len()),
            top_denial_reasons: top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn case_with(status: CaseStatus, reason: Option<&str>) -> Case {
        let mut case = Case::extracted("Patient", "Dx", vec!["M25.561".into()], vec!["73721".into()]);
        case.status = status;
        case.denial_reason = reason.map(str::to_string);
        case
    }

    #[test]
    fn test_empty_store() {
        let stats = CaseStatistics::from_cases(&[]);
        assert_eq!(stats.total_cases, 0);
        assert_eq!(stats.approval_rate, Decimal::ZERO);
        assert_eq!(stats.completion_rate, Decimal::ZERO);
        assert!(stats.top_denial_reasons.is_empty());
    }

    #[test]
    fn test_rates_round_to_one_decimal() {
        let cases = vec![
            case_with(CaseStatus::Approved, None),
            case_with(CaseStatus::Denied, Some("Missing referral")),
            case_with(CaseStatus::Denied, Some("Missing referral")),
            case_with(CaseStatus::Extracted, None),
            case_with(CaseStatus::Processing, None),
            case_with(CaseStatus::ValidationFailed, None),
        ];
        let stats = CaseStatistics::from_cases(&cases);

        assert_eq!(stats.approved, 1);
        assert_eq!(stats.denied, 2);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approval_rate, dec!(33.3));
        assert_eq!(stats.completion_rate, dec!(50.0));
        assert_eq!(
            stats.top_denial_reasons,
            vec![DenialReasonCount {
                reason: "Missing referral".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_top_reasons_capped_at_five() {
        let cases: Vec<Case> = (0..7)
            .map(|i| case_with(CaseStatus::Denied, Some(&format!("reason {i}"))))
            .chain(std::iter::once(case_with(CaseStatus::Denied, Some("reason 6"))))
            .collect();
        let stats = CaseStatistics::from_cases(&cases);

        assert_eq!(stats.top_denial_reasons.len(), 5);
        assert_eq!(stats.top_denial_reasons[0].reason, "reason 6");
        assert_eq!(stats.top_denial_reasons[0].count, 2);
    }
}
