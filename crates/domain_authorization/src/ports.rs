//! Adjudication Ports
//!
//! This module defines the collaborator interfaces the adjudication pipeline
//! depends on. Every collaborator is injected at construction time as an
//! `Arc<dyn ...>`, so the pipeline can run against PostgreSQL and HTTP
//! services in production and against the in-memory [`mock`] adapters in tests.
//!
//! # Collaborators
//!
//! - [`CaseStore`]: case persistence with merge updates and atomic timeline appends
//! - [`CodeReference`]: diagnosis-code lookup
//! - [`BlobStore`]: existence checks for uploaded evidence documents
//! - [`ReasoningService`]: text completion used for structured clinical judgments
//! - [`AgentService`]: delegation of a whole case to an external agent loop
//!
//! # Usage
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::new(
//!     config,
//!     Collaborators {
//!         cases: Arc::new(PgCaseStore::new(pool)),
//!         codes: Arc::new(ClinicalTablesClient::new(codes_config)?),
//!         blobs: Arc::new(FsBlobStore::new(root)),
//!         reasoning: Some(Arc::new(HttpReasoningClient::new(reasoning_config)?)),
//!         agent: None,
//!     },
//! );
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use core_kernel::{CaseId, DomainPort, HealthCheckable, PortError};

use crate::case::{Case, CaseUpdate, TimelineEvent};

/// Case persistence
///
/// Updates use merge semantics: fields not named in the [`CaseUpdate`] are
/// left untouched. Timeline events are only ever appended, and an append must
/// be atomic with respect to concurrent appends on the same case.
#[async_trait]
pub trait CaseStore: DomainPort + HealthCheckable {
    /// Retrieves a case, or `PortError::NotFound`
    async fn get(&self, case_id: CaseId) -> Result<Case, PortError>;

    /// Stores a new case record
    async fn insert(&self, case: Case) -> Result<(), PortError>;

    /// Applies a partial update and returns the merged record
    async fn update(&self, case_id: CaseId, update: CaseUpdate) -> Result<Case, PortError>;

    /// Appends one event to the end of the case timeline
    async fn append_timeline(&self, case_id: CaseId, event: TimelineEvent) -> Result<(), PortError>;

    /// Lists stored cases, most recently created first
    async fn list(&self, limit: Option<u32>) -> Result<Vec<Case>, PortError>;
}

/// Result of a diagnosis-code lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLookup {
    pub valid: bool,
    pub description: Option<String>,
    /// Name of the reference source, for the audit trail
    pub source: String,
}

/// Diagnosis-code reference service
///
/// A code that does not exist is `Ok` with `valid: false`. Any error means
/// the service could not answer.
#[async_trait]
pub trait CodeReference: DomainPort + HealthCheckable {
    async fn lookup(&self, code: &str) -> Result<CodeLookup, PortError>;
}

/// Evidence document storage
#[async_trait]
pub trait BlobStore: DomainPort + HealthCheckable {
    async fn exists(&self, path: &str) -> Result<bool, PortError>;
}

/// Sampling parameters for one completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionParams {
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self { temperature, max_tokens }
    }
}

/// Text-completion service
///
/// Implementations return the model text already extracted from whatever
/// response envelope the service uses; the text itself may still be fenced.
#[async_trait]
pub trait ReasoningService: DomainPort + HealthCheckable {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, PortError>;
}

/// One delegation request to the autonomous agent service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub agent_id: String,
    pub alias_id: String,
    pub session_id: String,
    pub input_text: String,
}

/// Stream of completion chunks produced by an agent run
pub type AgentStream = mpsc::Receiver<Result<String, PortError>>;

/// Autonomous agent service
#[async_trait]
pub trait AgentService: DomainPort + HealthCheckable {
    /// Starts an agent run; chunks arrive on the returned stream
    async fn invoke(&self, invocation: AgentInvocation) -> Result<AgentStream, PortError>;
}

/// Extension trait for AgentService with convenience methods
#[async_trait]
pub trait AgentServiceExt: AgentService {
    /// Runs the agent and concatenates every chunk into the final response
    ///
    /// The first failed chunk aborts the run.
    async fn invoke_to_completion(&self, invocation: AgentInvocation) -> Result<String, PortError> {
        let mut stream = self.invoke(invocation).await?;
        let mut response = String::new();
        while let Some(chunk) = stream.recv().await {
            response.push_str(&chunk?);
        }
        Ok(response)
    }
}

// Blanket implementation for all AgentService implementors
impl<T: AgentService + ?Sized> AgentServiceExt for T {}

/// In-memory collaborators for testing
///
/// These adapters keep all state in memory and can be told to fail, so the
/// pipeline's fallback and error paths can be exercised without a database
/// or network.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult};

    fn healthy(adapter_id: &str) -> HealthCheckResult {
        HealthCheckResult::new(adapter_id, AdapterHealth::Healthy, 0)
            .with_message("Mock adapter always healthy")
    }

    // ========================================================================
    // Case store
    // ========================================================================

    /// In-memory case store
    #[derive(Debug, Default)]
    pub struct MockCaseStore {
        cases: Arc<RwLock<HashMap<CaseId, Case>>>,
        fail_updates: AtomicBool,
        fail_appends: AtomicBool,
    }

    impl MockCaseStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with cases for testing
        pub async fn with_cases(cases: Vec<Case>) -> Self {
            let store = Self::new();
            for case in cases {
                store.cases.write().await.insert(case.case_id, case);
            }
            store
        }

        /// Makes every subsequent update fail with a connection error
        pub fn fail_updates(&self, fail: bool) {
            self.fail_updates.store(fail, Ordering::SeqCst);
        }

        /// Makes every subsequent timeline append fail with a connection error
        pub fn fail_appends(&self, fail: bool) {
            self.fail_appends.store(fail, Ordering::SeqCst);
        }

        /// Returns a snapshot of a stored case
        pub async fn snapshot(&self, case_id: CaseId) -> Option<Case> {
            self.cases.read().await.get(&case_id).cloned()
        }
    }

    impl DomainPort for MockCaseStore {}

    #[async_trait]
    impl HealthCheckable for MockCaseStore {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-case-store")
        }
    }

    #[async_trait]
    impl CaseStore for MockCaseStore {
        async fn get(&self, case_id: CaseId) -> Result<Case, PortError> {
            self.cases
                .read()
                .await
                .get(&case_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Case", case_id))
        }

        async fn insert(&self, case: Case) -> Result<(), PortError> {
            let mut cases = self.cases.write().await;
            if cases.contains_key(&case.case_id) {
                return Err(PortError::Conflict {
                    message: format!("case {} already exists", case.case_id),
                });
            }
            cases.insert(case.case_id, case);
            Ok(())
        }

        async fn update(&self, case_id: CaseId, update: CaseUpdate) -> Result<Case, PortError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(PortError::connection("mock case store unavailable"));
            }
            let mut cases = self.cases.write().await;
            let case = cases
                .get_mut(&case_id)
                .ok_or_else(|| PortError::not_found("Case", case_id))?;
            case.apply(update);
            Ok(case.clone())
        }

        async fn append_timeline(&self, case_id: CaseId, event: TimelineEvent) -> Result<(), PortError> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(PortError::connection("mock case store unavailable"));
            }
            let mut cases = self.cases.write().await;
            let case = cases
                .get_mut(&case_id)
                .ok_or_else(|| PortError::not_found("Case", case_id))?;
            case.timeline.push(event);
            Ok(())
        }

        async fn list(&self, limit: Option<u32>) -> Result<Vec<Case>, PortError> {
            let mut cases: Vec<Case> = self.cases.read().await.values().cloned().collect();
            cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(limit) = limit {
                cases.truncate(limit as usize);
            }
            Ok(cases)
        }
    }

    // ========================================================================
    // Code reference
    // ========================================================================

    /// In-memory diagnosis-code reference
    ///
    /// Known codes are valid and unknown codes come back with `valid: false`.
    /// Codes marked as failing return a service error.
    #[derive(Debug, Default)]
    pub struct MockCodeReference {
        codes: HashMap<String, String>,
        failing: HashSet<String>,
        not_found: HashSet<String>,
        unavailable: bool,
    }

    impl MockCodeReference {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a valid code with its description
        pub fn with_code(mut self, code: impl Into<String>, description: impl Into<String>) -> Self {
            self.codes.insert(code.into(), description.into());
            self
        }

        /// Makes lookups of one code fail with a timeout
        pub fn failing_on(mut self, code: impl Into<String>) -> Self {
            self.failing.insert(code.into());
            self
        }

        /// Makes lookups of one code fail with a port-level `NotFound`
        pub fn not_found_on(mut self, code: impl Into<String>) -> Self {
            self.not_found.insert(code.into());
            self
        }

        /// A reference service that cannot answer at all
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }
    }

    impl DomainPort for MockCodeReference {}

    #[async_trait]
    impl HealthCheckable for MockCodeReference {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-code-reference")
        }
    }

    #[async_trait]
    impl CodeReference for MockCodeReference {
        async fn lookup(&self, code: &str) -> Result<CodeLookup, PortError> {
            if self.unavailable {
                return Err(PortError::unavailable("mock code reference"));
            }
            if self.failing.contains(code) {
                return Err(PortError::timeout("code lookup", 5_000));
            }
            if self.not_found.contains(code) {
                return Err(PortError::not_found("code-reference", "requested resource"));
            }
            Ok(CodeLookup {
                valid: self.codes.contains_key(code),
                description: self.codes.get(code).cloned(),
                source: "Mock Code Reference".to_string(),
            })
        }
    }

    // ========================================================================
    // Blob store
    // ========================================================================

    /// In-memory blob store keyed by path
    #[derive(Debug, Default)]
    pub struct MockBlobStore {
        paths: RwLock<HashSet<String>>,
        failing: AtomicBool,
    }

    impl MockBlobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_paths<I, S>(paths: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let store = Self::new();
            for path in paths {
                store.put(path).await;
            }
            store
        }

        pub async fn put(&self, path: impl Into<String>) {
            self.paths.write().await.insert(path.into());
        }

        /// Makes every probe fail with a connection error
        pub fn fail_probes(&self, fail: bool) {
            self.failing.store(fail, Ordering::SeqCst);
        }
    }

    impl DomainPort for MockBlobStore {}

    #[async_trait]
    impl HealthCheckable for MockBlobStore {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-blob-store")
        }
    }

    #[async_trait]
    impl BlobStore for MockBlobStore {
        async fn exists(&self, path: &str) -> Result<bool, PortError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PortError::connection("mock blob store unavailable"));
            }
            Ok(self.paths.read().await.contains(path))
        }
    }

    // ========================================================================
    // Reasoning service
    // ========================================================================

    /// Scripted reasoning service
    ///
    /// Each rule pairs a prompt fragment with a canned response; the first
    /// rule whose fragment occurs in the prompt answers. A prompt matching no
    /// rule fails as if the service were unreachable.
    #[derive(Debug, Default)]
    pub struct MockReasoningService {
        rules: Vec<(String, String)>,
        prompts: RwLock<Vec<(String, CompletionParams)>>,
    }

    impl MockReasoningService {
        /// A service that never answers
        pub fn unavailable() -> Self {
            Self::default()
        }

        /// Answers prompts containing `fragment` with `response`
        pub fn respond_when(mut self, fragment: impl Into<String>, response: impl Into<String>) -> Self {
            self.rules.push((fragment.into(), response.into()));
            self
        }

        /// Every prompt received so far, in order
        pub async fn prompts(&self) -> Vec<(String, CompletionParams)> {
            self.prompts.read().await.clone()
        }
    }

    impl DomainPort for MockReasoningService {}

    #[async_trait]
    impl HealthCheckable for MockReasoningService {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-reasoning-service")
        }
    }

    #[async_trait]
    impl ReasoningService for MockReasoningService {
        async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, PortError> {
            self.prompts.write().await.push((prompt.to_string(), params));
            self.rules
                .iter()
                .find(|(fragment, _)| prompt.contains(fragment.as_str()))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| PortError::unavailable("mock reasoning service"))
        }
    }

    // ========================================================================
    // Agent service
    // ========================================================================

    /// Scripted agent service
    #[derive(Debug, Default)]
    pub struct MockAgentService {
        chunks: Vec<String>,
        fail_invoke: bool,
        fail_mid_stream: bool,
        invocations: RwLock<Vec<AgentInvocation>>,
    }

    impl MockAgentService {
        /// An agent that streams the given chunks and completes
        pub fn streaming<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                chunks: chunks.into_iter().map(Into::into).collect(),
                ..Self::default()
            }
        }

        /// An agent that cannot be reached
        pub fn unreachable() -> Self {
            Self {
                fail_invoke: true,
                ..Self::default()
            }
        }

        /// An agent whose stream breaks after the scripted chunks
        pub fn breaking_after<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                fail_mid_stream: true,
                ..Self::streaming(chunks)
            }
        }

        pub async fn invocations(&self) -> Vec<AgentInvocation> {
            self.invocations.read().await.clone()
        }
    }

    impl DomainPort for MockAgentService {}

    #[async_trait]
    impl HealthCheckable for MockAgentService {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-agent-service")
        }
    }

    #[async_trait]
    impl AgentService for MockAgentService {
        async fn invoke(&self, invocation: AgentInvocation) -> Result<AgentStream, PortError> {
            self.invocations.write().await.push(invocation);
            if self.fail_invoke {
                return Err(PortError::unavailable("mock agent service"));
            }
            let capacity = self.chunks.len() + 1;
            let (tx, rx) = mpsc::channel(capacity);
            for chunk in &self.chunks {
                // Capacity covers every message, so sends cannot block
                let _ = tx.try_send(Ok(chunk.clone()));
            }
            if self.fail_mid_stream {
                let _ = tx.try_send(Err(PortError::connection("agent stream reset")));
            }
            Ok(rx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::case::{CaseStatus, TimelineTag};

    fn sample_case() -> Case {
        Case::extracted("Jane Doe", "Low back pain", vec!["M54.5".into()], vec!["72148".into()])
    }

    #[tokio::test]
    async fn test_mock_store_get_missing_is_not_found() {
        let store = MockCaseStore::new();
        let err = store.get(CaseId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_store_update_and_append() {
        let case = sample_case();
        let id = case.case_id;
        let store = MockCaseStore::with_cases(vec![case]).await;

        let updated = store.update(id, CaseUpdate::status(CaseStatus::Processing)).await.unwrap();
        assert_eq!(updated.status, CaseStatus::Processing);

        store
            .append_timeline(id, TimelineEvent::now("Validating", TimelineTag::Validating))
            .await
            .unwrap();
        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.timeline.len(), 2);
        assert_eq!(stored.timeline[1].event, "Validating");
    }

    #[tokio::test]
    async fn test_mock_store_rejects_duplicate_insert() {
        let case = sample_case();
        let store = MockCaseStore::new();
        store.insert(case.clone()).await.unwrap();
        assert!(matches!(store.insert(case).await, Err(PortError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_agent_stream_is_concatenated() {
        let agent = MockAgentService::streaming(["Authorization ", "approved."]);
        let invocation = AgentInvocation {
            agent_id: "agent".into(),
            alias_id: "TSTALIASID".into(),
            session_id: "session-1".into(),
            input_text: "Process".into(),
        };
        let response = agent.invoke_to_completion(invocation).await.unwrap();
        assert_eq!(response, "Authorization approved.");
    }

    #[tokio::test]
    async fn test_agent_stream_failure_aborts() {
        let agent = MockAgentService::breaking_after(["partial"]);
        let invocation = AgentInvocation {
            agent_id: "agent".into(),
            alias_id: "TSTALIASID".into(),
            session_id: "session-1".into(),
            input_text: "Process".into(),
        };
        assert!(agent.invoke_to_completion(invocation).await.is_err());
    }

    #[tokio::test]
    async fn test_reasoning_mock_matches_fragment() {
        let service = MockReasoningService::unavailable().respond_when("CPT Code: 12345", "{}");
        let params = CompletionParams::new(0.3, 400);
        assert_eq!(service.complete("CPT Code: 12345", params).await.unwrap(), "{}");
        assert!(service.complete("something else", params).await.is_err());
        assert_eq!(service.prompts().await.len(), 2);
    }
}
