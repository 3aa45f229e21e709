//! Adjudication workflows through the HTTP surface

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};

use domain_authorization::ports::mock::{MockBlobStore, MockCaseStore, MockReasoningService};
use domain_authorization::{
    AdjudicationConfig, BlobStore, Case, CaseStatus, Collaborators, DecisionMethod, ReasoningService, TimelineTag,
};
use interface_api::{create_router, AppState};
use test_utils::{
    assert_case_invariants, assert_status, assert_timeline_contains, CaseBuilder, CodeFixtures, EvidenceFixtures,
    ReasoningFixtures, PROCEDURE_PROMPT,
};

struct Workflow {
    case: Case,
    reasoning: Option<MockReasoningService>,
    blobs: Option<MockBlobStore>,
}

impl Workflow {
    fn new(case: Case) -> Self {
        Self {
            case,
            reasoning: None,
            blobs: None,
        }
    }

    fn reasoning(mut self, reasoning: MockReasoningService) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    fn blobs(mut self, blobs: MockBlobStore) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Adjudicates the case and returns the response body and stored record
    async fn run(self) -> (Value, Case) {
        let case_id = self.case.case_id;
        let store = Arc::new(MockCaseStore::with_cases(vec![self.case]).await);
        let blobs: Arc<dyn BlobStore> = Arc::new(self.blobs.unwrap_or_default());
        let state = AppState::new(
            AdjudicationConfig::default(),
            Collaborators {
                cases: store.clone(),
                codes: Arc::new(CodeFixtures::code_reference()),
                blobs,
                reasoning: self.reasoning.map(|r| Arc::new(r) as Arc<dyn ReasoningService>),
                agent: None,
            },
        );
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/api/v1/adjudications")
            .json(&json!({ "case_id": case_id.to_string() }))
            .await;
        response.assert_status_ok();

        let stored = store.snapshot(case_id).await.unwrap();
        assert_case_invariants(&stored);
        (response.json(), stored)
    }
}

fn method_of(case: &Case) -> DecisionMethod {
    case.payer_result.as_ref().map(|p| p.method).unwrap()
}

mod ai_review_tests {
    use super::*;

    #[tokio::test]
    async fn test_ai_approval_is_final() {
        let (body, stored) = Workflow::new(CaseBuilder::new().build())
            .reasoning(ReasoningFixtures::approving_service())
            .run()
            .await;

        assert_eq!(body["status"], "approved");
        assert_status(&stored, CaseStatus::Approved);
        assert_eq!(method_of(&stored), DecisionMethod::AiReview);
        assert_timeline_contains(&stored, "APPROVED - Authorization #AUTH-", TimelineTag::Approved);
    }

    #[tokio::test]
    async fn test_ai_denial_carries_required_actions() {
        let (body, stored) = Workflow::new(CaseBuilder::new().build())
            .reasoning(ReasoningFixtures::denying_service())
            .run()
            .await;

        assert_eq!(body["status"], "denied");
        assert_eq!(body["reason"], "Conservative treatment not documented.");
        assert_eq!(method_of(&stored), DecisionMethod::AiReview);
        let payer = stored.payer_result.unwrap();
        assert_eq!(payer.required_documents, vec!["Physical therapy notes"]);
        assert!(payer.next_steps.unwrap().contains("Resubmit with PT notes"));
    }

    #[tokio::test]
    async fn test_unparseable_review_falls_back_to_rules() {
        let reasoning = MockReasoningService::unavailable()
            .respond_when(test_utils::REVIEW_PROMPT, ReasoningFixtures::garbled());
        let (_, stored) = Workflow::new(CaseBuilder::new().build())
            .reasoning(reasoning)
            .run()
            .await;

        assert_status(&stored, CaseStatus::Denied);
        assert_eq!(method_of(&stored), DecisionMethod::RuleFallback);
        assert_eq!(
            stored.payer_result.unwrap().denial_code.as_deref(),
            Some("INSUFFICIENT_EVIDENCE_001")
        );
    }
}

mod fallback_rule_tests {
    use super::*;

    #[tokio::test]
    async fn test_non_specific_back_pain_without_therapy() {
        let case = CaseBuilder::new()
            .with_codes(&[CodeFixtures::low_back_pain()], &[CodeFixtures::lumbar_mri()])
            .with_evidence(EvidenceFixtures::none())
            .build();
        let (_, stored) = Workflow::new(case).run().await;

        assert_status(&stored, CaseStatus::Denied);
        assert_timeline_contains(&stored, "Insufficient medical necessity", TimelineTag::Denied);
    }

    #[tokio::test]
    async fn test_arthroscopy_for_sprain_is_inappropriate() {
        // Arthroscopy is outside the curated procedure table
        let reasoning = MockReasoningService::unavailable().respond_when(
            PROCEDURE_PROMPT,
            json!({"valid": true, "description": "Ankle arthroscopy", "category": "Surgery"}).to_string(),
        );
        let case = CaseBuilder::new()
            .with_codes(&[CodeFixtures::ankle_sprain()], &[CodeFixtures::ankle_arthroscopy()])
            .with_evidence(EvidenceFixtures::complete())
            .build();
        let (_, stored) = Workflow::new(case).reasoning(reasoning).run().await;

        assert_status(&stored, CaseStatus::Denied);
        let payer = stored.payer_result.unwrap();
        assert_eq!(payer.method, DecisionMethod::RuleFallback);
        assert_eq!(payer.denial_code.as_deref(), Some("INAPPROPRIATE_PROCEDURE_006"));
    }

    #[tokio::test]
    async fn test_knee_replacement_requires_workup() {
        let case = CaseBuilder::new()
            .with_codes(&["M17.11"], &[CodeFixtures::knee_replacement()])
            .with_evidence(EvidenceFixtures::pt_notes())
            .build();
        let (_, stored) = Workflow::new(case).run().await;

        assert_status(&stored, CaseStatus::Denied);
        assert_eq!(
            stored.payer_result.unwrap().required_documents,
            vec!["xray", "clinical_notes"]
        );
    }

    #[tokio::test]
    async fn test_knee_replacement_with_full_workup_is_approved() {
        let case = CaseBuilder::new()
            .with_codes(&["M17.11"], &[CodeFixtures::knee_replacement()])
            .with_evidence(EvidenceFixtures::complete())
            .build();
        let (body, stored) = Workflow::new(case).run().await;

        assert_eq!(body["status"], "approved");
        assert_eq!(method_of(&stored), DecisionMethod::RuleFallback);
    }
}

mod evidence_tests {
    use super::*;

    #[tokio::test]
    async fn test_documents_in_storage_satisfy_evidence() {
        let case = CaseBuilder::new().with_evidence(EvidenceFixtures::pt_notes()).build();
        let blobs = EvidenceFixtures::blobs_for(case.case_id, &["pt_notes", "clinical_summary"]).await;
        let (body, stored) = Workflow::new(case).blobs(blobs).run().await;

        assert_eq!(body["required_documents"], json!([]));
        assert_timeline_contains(&stored, "Sufficient clinical evidence found", TimelineTag::Success);
    }

    #[tokio::test]
    async fn test_missing_documents_only_warn() {
        let case = CaseBuilder::new().with_evidence(EvidenceFixtures::pt_notes()).build();
        let blobs = EvidenceFixtures::blobs_for(case.case_id, &["pt_notes"]).await;
        let (body, stored) = Workflow::new(case).blobs(blobs).run().await;

        assert_eq!(body["status"], "approved");
        assert_eq!(body["required_documents"], json!(["clinical_summary"]));
        assert_timeline_contains(&stored, "Missing evidence: clinical_summary", TimelineTag::Warning);
    }
}
