//! Adjudication configuration
//!
//! All settings have defaults, so an empty configuration source yields a
//! working deterministic pipeline with autonomous delegation disabled.

use serde::Deserialize;

use core_kernel::CaseId;

use crate::ports::CompletionParams;
use crate::reasoning::EnvelopeFormat;

/// Top-level adjudication settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdjudicationConfig {
    /// Payer name stamped on every decision
    pub payer_name: String,
    pub autonomous: AutonomousAgentConfig,
    pub reasoning: ReasoningConfig,
    pub evidence: EvidenceConfig,
}

impl Default for AdjudicationConfig {
    fn default() -> Self {
        Self {
            payer_name: "Mock Insurance Co.".to_string(),
            autonomous: AutonomousAgentConfig::default(),
            reasoning: ReasoningConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

/// Autonomous delegation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutonomousAgentConfig {
    pub enabled: bool,
    pub agent_id: Option<String>,
    pub alias_id: String,
}

impl Default for AutonomousAgentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            agent_id: None,
            alias_id: "TSTALIASID".to_string(),
        }
    }
}

impl AutonomousAgentConfig {
    /// Agent id to delegate to, if delegation is switched on
    pub fn active_agent(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.agent_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Reasoning-service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Request/response envelope of the reasoning endpoint
    pub envelope: EnvelopeFormat,
    /// Medical-necessity review in the decision engine
    pub review: CompletionParams,
    /// Classification of procedure codes missing from the curated table
    pub procedure_classification: CompletionParams,
    /// Diagnosis/procedure pairing judgment
    pub pairing_judgment: CompletionParams,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            envelope: EnvelopeFormat::default(),
            review: CompletionParams::new(0.2, 1500),
            procedure_classification: CompletionParams::new(0.3, 400),
            pairing_judgment: CompletionParams::new(0.3, 500),
        }
    }
}

/// Evidence lookup settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Key prefix under which case documents are stored
    pub prefix: String,
    /// Extensions probed for each document type, in order
    pub extensions: Vec<String>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            prefix: "evidence".to_string(),
            extensions: [".pdf", ".txt", ".jpg", ".png", ".dcm"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl EvidenceConfig {
    /// Storage path of one document candidate
    pub fn document_path(&self, case_id: CaseId, doc_type: &str, extension: &str) -> String {
        format!("{}/{}/{}{}", self.prefix, case_id.as_uuid(), doc_type, extension)
    }
}
