//! Orchestrator
//!
//! Drives one adjudication run for a case:
//!
//! ```text
//! load case ─▶ processing ─▶ [autonomous agent] ──ok──▶ completed
//!                                  │ failed / disabled
//!                                  ▼
//!                              validate ──invalid──▶ validation_failed
//!                                  │
//!                                  ▼
//!                           check evidence (never halts)
//!                                  │
//!                                  ▼
//!                               decide ──▶ approved | denied
//! ```
//!
//! Any store failure after the case is loaded ends the run in `error`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use core_kernel::{CaseId, PortError};

use crate::case::{Case, CaseStatus, CaseUpdate, Patch, TimelineEvent, TimelineTag};
use crate::config::AdjudicationConfig;
use crate::decision::{DecisionEngine, DecisionStatus, PayerDecision, PayerRequest};
use crate::error::AdjudicationError;
use crate::evidence::{EvidenceReport, EvidenceStep};
use crate::ports::{AgentInvocation, AgentService, AgentServiceExt, BlobStore, CaseStore, CodeReference, ReasoningService};
use crate::validation::{ValidationReport, ValidationStep};

/// Collaborators injected into the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub cases: Arc<dyn CaseStore>,
    pub codes: Arc<dyn CodeReference>,
    pub blobs: Arc<dyn BlobStore>,
    pub reasoning: Option<Arc<dyn ReasoningService>>,
    pub agent: Option<Arc<dyn AgentService>>,
}

/// How a run was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMethod {
    AutonomousAgent,
    StepByStep,
}

impl OrchestrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationMethod::AutonomousAgent => "autonomous_agent",
            OrchestrationMethod::StepByStep => "step_by_step",
        }
    }
}

/// Result of one orchestration run
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationOutcome {
    pub case_id: CaseId,
    pub status: CaseStatus,
    pub method: OrchestrationMethod,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    /// Evidence documents still missing
    pub required_documents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidenceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<PayerDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_response: Option<String>,
}

impl OrchestrationOutcome {
    fn new(case_id: CaseId, status: CaseStatus, method: OrchestrationMethod, message: &str) -> Self {
        Self {
            case_id,
            status,
            method,
            message: message.to_string(),
            authorization_number: None,
            reason: None,
            next_steps: None,
            required_documents: Vec::new(),
            validation: None,
            evidence: None,
            payer: None,
            agent_response: None,
        }
    }
}

/// Adjudication orchestrator
pub struct Orchestrator {
    config: AdjudicationConfig,
    cases: Arc<dyn CaseStore>,
    agent: Option<Arc<dyn AgentService>>,
    validation: ValidationStep,
    evidence: EvidenceStep,
    decision: DecisionEngine,
    /// Serialises runs for the same case within this process
    locks: Mutex<HashMap<CaseId, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(config: AdjudicationConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            cases,
            codes,
            blobs,
            reasoning,
            agent,
        } = collaborators;

        Self {
            validation: ValidationStep::new(codes, reasoning.clone(), config.reasoning.clone()),
            evidence: EvidenceStep::new(blobs, config.evidence.clone()),
            decision: DecisionEngine::new(reasoning, config.reasoning.clone(), config.payer_name.clone()),
            cases,
            agent,
            locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Case store the orchestrator writes to
    pub fn cases(&self) -> &Arc<dyn CaseStore> {
        &self.cases
    }

    /// Runs the adjudication pipeline for a case
    #[instrument(skip(self, case_id), fields(case_id = %case_id))]
    pub async fn process(&self, case_id: CaseId) -> Result<OrchestrationOutcome, AdjudicationError> {
        let lock = self.case_lock(case_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run(case_id).await
        };
        drop(lock);
        self.release_lock(case_id).await;
        result
    }

    async fn run(&self, case_id: CaseId) -> Result<OrchestrationOutcome, AdjudicationError> {
        let case = self
            .cases
            .get(case_id)
            .await
            .map_err(|e| AdjudicationError::from_store(case_id, e))?;

        match self.drive(&case).await {
            Ok(outcome) => {
                info!(status = %outcome.status, method = outcome.method.as_str(), "Orchestration complete");
                Ok(outcome)
            }
            Err(e) => {
                let message = format!("Orchestration error: {e}");
                error!(error = %e, "Orchestration failed");
                self.record_failure(case_id, &message).await;
                Err(AdjudicationError::Fatal(e))
            }
        }
    }

    async fn drive(&self, case: &Case) -> Result<OrchestrationOutcome, PortError> {
        let case_id = case.case_id;
        self.cases
            .update(
                case_id,
                CaseUpdate {
                    status: Some(CaseStatus::Processing),
                    processing_started_at: Patch::Set(Utc::now()),
                    validation_result: Patch::Clear,
                    evidence_result: Patch::Clear,
                    payer_result: Patch::Clear,
                    authorization_number: Patch::Clear,
                    denial_reason: Patch::Clear,
                    agent_response: Patch::Clear,
                    error: Patch::Clear,
                    ..Default::default()
                },
            )
            .await?;
        self.event(case_id, "Started prior authorization processing", TimelineTag::Processing)
            .await?;

        if let Some(outcome) = self.try_delegation(case).await? {
            return Ok(outcome);
        }

        self.step_by_step(case).await
    }

    /// Delegates the whole case to the autonomous agent, if one is active
    ///
    /// `Ok(None)` means the deterministic pipeline should run.
    async fn try_delegation(&self, case: &Case) -> Result<Option<OrchestrationOutcome>, PortError> {
        let (Some(agent), Some(agent_id)) = (&self.agent, self.config.autonomous.active_agent()) else {
            return Ok(None);
        };
        let case_id = case.case_id;

        self.event(case_id, "Delegating to autonomous agent", TimelineTag::Delegating)
            .await?;
        info!(agent_id, "Delegating case to autonomous agent");

        let invocation = AgentInvocation {
            agent_id: agent_id.to_string(),
            alias_id: self.config.autonomous.alias_id.clone(),
            session_id: format!("session-{}", case_id.as_uuid()),
            input_text: delegation_input(case),
        };

        match agent.invoke_to_completion(invocation).await {
            Ok(response) => {
                let method = OrchestrationMethod::AutonomousAgent;
                self.cases
                    .update(
                        case_id,
                        CaseUpdate {
                            status: Some(CaseStatus::Completed),
                            orchestration_method: Patch::Set(method.as_str().to_string()),
                            agent_response: Patch::Set(response.clone()),
                            processed_at: Patch::Set(Utc::now()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.event(case_id, "Autonomous agent completed processing", TimelineTag::Completed)
                    .await?;

                let mut outcome = OrchestrationOutcome::new(
                    case_id,
                    CaseStatus::Completed,
                    method,
                    "Orchestration complete (autonomous agent)",
                );
                outcome.agent_response = Some(response);
                Ok(Some(outcome))
            }
            Err(e) => {
                warn!(error = %e, "Autonomous agent failed, falling back to step-by-step processing");
                self.event(
                    case_id,
                    format!("Autonomous agent unavailable, falling back to step-by-step processing: {e}"),
                    TimelineTag::Warning,
                )
                .await?;
                Ok(None)
            }
        }
    }

    async fn step_by_step(&self, case: &Case) -> Result<OrchestrationOutcome, PortError> {
        let case_id = case.case_id;
        let method = OrchestrationMethod::StepByStep;

        // Validate
        self.event(case_id, "Validating ICD-10 and CPT codes", TimelineTag::Validating)
            .await?;
        let validation = self.validation.validate(&case.icd10, &case.cpt).await;

        if validation.is_failure() {
            let message = validation.failure_message();
            self.event(case_id, format!("Code validation failed: {message}"), TimelineTag::Error)
                .await?;
            self.cases
                .update(
                    case_id,
                    CaseUpdate {
                        status: Some(CaseStatus::ValidationFailed),
                        validation_result: Patch::Set(validation.clone()),
                        orchestration_method: Patch::Set(method.as_str().to_string()),
                        processed_at: Patch::Set(Utc::now()),
                        ..Default::default()
                    },
                )
                .await?;

            let mut outcome =
                OrchestrationOutcome::new(case_id, CaseStatus::ValidationFailed, method, "Code validation failed");
            outcome.reason = Some(message);
            outcome.validation = Some(validation);
            return Ok(outcome);
        }
        self.event(case_id, "Codes validated successfully", TimelineTag::Success)
            .await?;

        // Check evidence
        self.event(case_id, "Checking clinical evidence and documentation", TimelineTag::Checking)
            .await?;
        let evidence = self.evidence.check(case_id, &case.cpt).await;
        if evidence.has_sufficient_evidence {
            self.event(case_id, "Sufficient clinical evidence found", TimelineTag::Success)
                .await?;
        } else {
            self.event(
                case_id,
                format!("Missing evidence: {}", evidence.missing_docs.join(", ")),
                TimelineTag::Warning,
            )
            .await?;
        }

        // Decide
        self.event(
            case_id,
            "Submitting to payer for AI-powered medical necessity review",
            TimelineTag::Submitting,
        )
        .await?;
        let payer = self.decision.decide(&PayerRequest::for_case(case)).await;
        let status = payer.status.case_status();

        let (authorization_number, denial_reason) = match payer.status {
            DecisionStatus::Approved => {
                let number = payer.authorization_number.clone().unwrap_or_else(|| "N/A".to_string());
                self.event(case_id, format!("APPROVED - Authorization #{number}"), TimelineTag::Approved)
                    .await?;
                (Some(number), None)
            }
            DecisionStatus::Denied => {
                let reason = payer
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Reason not specified".to_string());
                self.event(case_id, format!("DENIED - {reason}"), TimelineTag::Denied)
                    .await?;
                (None, Some(reason))
            }
        };

        self.cases
            .update(
                case_id,
                CaseUpdate {
                    status: Some(status),
                    validation_result: Patch::Set(validation.clone()),
                    evidence_result: Patch::Set(evidence.clone()),
                    payer_result: Patch::Set(payer.clone()),
                    authorization_number: Patch::set_or_clear(authorization_number.clone()),
                    denial_reason: Patch::set_or_clear(denial_reason.clone()),
                    orchestration_method: Patch::Set(method.as_str().to_string()),
                    processed_at: Patch::Set(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        let mut outcome = OrchestrationOutcome::new(case_id, status, method, "Orchestration complete");
        outcome.authorization_number = authorization_number;
        outcome.reason = denial_reason;
        outcome.next_steps = payer.next_steps.clone();
        outcome.required_documents = evidence.missing_docs.clone();
        outcome.validation = Some(validation);
        outcome.evidence = Some(evidence);
        outcome.payer = Some(payer);
        Ok(outcome)
    }

    async fn event(&self, case_id: CaseId, text: impl Into<String>, tag: TimelineTag) -> Result<(), PortError> {
        self.cases
            .append_timeline(case_id, TimelineEvent::now(text, tag))
            .await
    }

    /// Best-effort transition to `error` after a store failure
    async fn record_failure(&self, case_id: CaseId, message: &str) {
        let update = CaseUpdate {
            status: Some(CaseStatus::Error),
            error: Patch::Set(message.to_string()),
            processed_at: Patch::Set(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.cases.update(case_id, update).await {
            error!(error = %e, "Failed to record error status");
            return;
        }
        if let Err(e) = self.event(case_id, message, TimelineTag::Error).await {
            warn!(error = %e, "Failed to append error event");
        }
    }

    async fn case_lock(&self, case_id: CaseId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(case_id).or_default().clone()
    }

    async fn release_lock(&self, case_id: CaseId) {
        let mut locks = self.locks.lock().await;
        if locks.get(&case_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&case_id);
        }
    }
}

/// Instructions handed to the autonomous agent
fn delegation_input(case: &Case) -> String {
    format!(
        "Process prior authorization for case {case_id}.\n\n\
         Patient: {patient}\n\
         Diagnosis Codes (ICD-10): {icd10}\n\
         Procedure Codes (CPT): {cpt}\n\
         Diagnosis: {diagnosis}\n\n\
         Follow the complete workflow:\n\
         1. Validate the medical codes\n\
         2. Check for required evidence documents\n\
         3. Submit to the payer\n\
         4. Return the final authorization status\n\n\
         Use all available action groups to complete this task.",
        case_id = case.case_id.as_uuid(),
        patient = case.patient_name,
        icd10 = case.icd10.join(", "),
        cpt = case.cpt.join(", "),
        diagnosis = case.diagnosis,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockAgentService, MockBlobStore, MockCaseStore, MockCodeReference, MockReasoningService};

    fn knee_case() -> Case {
        Case::extracted(
            "John Smith",
            "Right knee pain",
            vec!["M25.561".into()],
            vec!["73721".into()],
        )
    }

    fn collaborators(store: Arc<MockCaseStore>) -> Collaborators {
        Collaborators {
            cases: store,
            codes: Arc::new(MockCodeReference::new().with_code("M25.561", "Pain in right knee")),
            blobs: Arc::new(MockBlobStore::new()),
            reasoning: None,
            agent: None,
        }
    }

    #[test]
    fn test_delegation_input_lists_workflow() {
        let case = knee_case();
        let input = delegation_input(&case);
        assert!(input.starts_with(&format!("Process prior authorization for case {}", case.case_id.as_uuid())));
        assert!(input.contains("Diagnosis Codes (ICD-10): M25.561"));
        assert!(input.contains("4. Return the final authorization status"));
    }

    #[tokio::test]
    async fn test_lock_entries_are_released() {
        let case = knee_case();
        let store = Arc::new(MockCaseStore::with_cases(vec![case.clone()]).await);
        let orchestrator = Orchestrator::new(AdjudicationConfig::default(), collaborators(store));

        orchestrator.process(case.case_id).await.unwrap();
        assert!(orchestrator.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_runs_keep_every_event() {
        let case = knee_case();
        let store = Arc::new(MockCaseStore::with_cases(vec![case.clone()]).await);
        let orchestrator = Arc::new(Orchestrator::new(AdjudicationConfig::default(), collaborators(store.clone())));

        let a = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.process(case.case_id).await }
        });
        let b = tokio::spawn({
            let o = orchestrator.clone();
            async move { o.process(case.case_id).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let stored = store.snapshot(case.case_id).await.unwrap();
        let starts = stored
            .timeline
            .iter()
            .filter(|e| e.event == "Started prior authorization processing")
            .count();
        assert_eq!(starts, 2);
        // Runs are serialised, so each start is followed by its own decision
        let tags: Vec<_> = stored.timeline.iter().map(|e| e.status).collect();
        let first_decision = tags.iter().position(|t| *t == TimelineTag::Denied).unwrap();
        let second_start = tags.iter().rposition(|t| *t == TimelineTag::Processing).unwrap();
        assert!(first_decision < second_start);
    }

    #[tokio::test]
    async fn test_disabled_delegation_never_calls_agent() {
        let case = knee_case();
        let store = Arc::new(MockCaseStore::with_cases(vec![case.clone()]).await);
        let agent = Arc::new(MockAgentService::streaming(["done"]));
        let mut parts = collaborators(store);
        parts.agent = Some(agent.clone());

        let outcome = Orchestrator::new(AdjudicationConfig::default(), parts)
            .process(case.case_id)
            .await
            .unwrap();
        assert_eq!(outcome.method, OrchestrationMethod::StepByStep);
        assert!(agent.invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_ai_review_feeds_case() {
        let case = knee_case();
        let store = Arc::new(MockCaseStore::with_cases(vec![case.clone()]).await);
        let reasoning = MockReasoningService::unavailable().respond_when(
            "medical necessity reviewer",
            r#"{"decision": "APPROVED", "confidence": "high", "reasoning": "Appropriate imaging."}"#,
        );
        let mut parts = collaborators(store.clone());
        parts.reasoning = Some(Arc::new(reasoning));

        let outcome = Orchestrator::new(AdjudicationConfig::default(), parts)
            .process(case.case_id)
            .await
            .unwrap();
        assert_eq!(outcome.status, CaseStatus::Approved);

        let stored = store.snapshot(case.case_id).await.unwrap();
        assert_eq!(stored.authorization_number, outcome.authorization_number);
        assert!(stored.denial_reason.is_none());
        assert_eq!(stored.orchestration_method.as_deref(), Some("step_by_step"));
    }
}
