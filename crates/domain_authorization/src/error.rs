//! Adjudication domain errors

use thiserror::Error;

use core_kernel::{CaseId, PortError};

/// Errors that leave the orchestrator
///
/// Invalid codes, fallback-triggering service failures and malformed decision
/// requests are step outcomes recorded on the case, not errors.
#[derive(Debug, Error)]
pub enum AdjudicationError {
    #[error("Case not found: {0}")]
    NotFound(CaseId),

    #[error("Orchestration error: {0}")]
    Fatal(#[source] PortError),
}

impl AdjudicationError {
    /// Maps a store failure for the given case
    pub fn from_store(case_id: CaseId, error: PortError) -> Self {
        if error.is_not_found() {
            AdjudicationError::NotFound(case_id)
        } else {
            AdjudicationError::Fatal(error)
        }
    }
}

/// A reasoning or delegation failure that triggers a fallback path
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoverableFailure {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("unparsable response: {0}")]
    Unparsable(String),

    #[error("not configured")]
    NotConfigured,
}

impl From<PortError> for RecoverableFailure {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Transformation { message } => RecoverableFailure::Unparsable(message),
            other => RecoverableFailure::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let id = CaseId::new();
        let err = AdjudicationError::from_store(id, PortError::not_found("Case", id));
        assert!(matches!(err, AdjudicationError::NotFound(found) if found == id));
    }

    #[test]
    fn test_store_connection_failure_is_fatal() {
        let err = AdjudicationError::from_store(CaseId::new(), PortError::connection("refused"));
        assert!(matches!(err, AdjudicationError::Fatal(_)));
        assert!(err.to_string().starts_with("Orchestration error"));
    }

    #[test]
    fn test_port_error_to_recoverable() {
        let failure: RecoverableFailure = PortError::transformation("missing content").into();
        assert_eq!(failure, RecoverableFailure::Unparsable("missing content".into()));

        let failure: RecoverableFailure = PortError::timeout("complete", 30_000).into();
        assert!(matches!(failure, RecoverableFailure::Unavailable(_)));
    }
}
