//! Errors raised by provisioning and replication workflows.

use serde_json::Value;
use thiserror::Error;
use yba_api::ApiError;

use crate::templates::TemplateError;

/// Failure of a workflow stage. Earlier stages are never swallowed: invoker
/// and template failures are wrapped as-is.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A template family was rendered without one of its required keys.
    #[error("template family '{family}' is missing required parameters: {}", .names.join(", "))]
    MissingParameters { family: String, names: Vec<String> },

    #[error("no {kind} named '{name}' exists")]
    NotFound { kind: String, name: String },

    /// More than one resource carries the name and the policy demands a unique match.
    #[error("{count} {kind}s are named '{name}': {}", .uuids.join(", "))]
    AmbiguousName {
        kind: String,
        name: String,
        count: usize,
        uuids: Vec<String>,
    },

    /// The dry-run endpoint rejected the configuration; nothing was submitted.
    #[error("configuration rejected by validation: {message}")]
    ValidationFailed { message: String, diagnostic: Value },

    /// Package metadata extraction did not yield a version in time.
    #[error("metadata for package {package_url} is unavailable; last response: {last}")]
    ReleaseMetadataUnavailable { package_url: String, last: Value },

    /// A 2xx response that lacks the fields the workflow depends on.
    #[error("unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },
}

impl EngineError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn unexpected(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Remote diagnostic attached to the failure, if any: the rejection body
    /// for validation failures, the task document for task failures.
    pub fn diagnostic(&self) -> Option<&Value> {
        match self {
            Self::ValidationFailed { diagnostic, .. } => Some(diagnostic),
            Self::ReleaseMetadataUnavailable { last, .. } => Some(last),
            Self::Api(error) => error.diagnostic(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ambiguous_names_list_every_candidate() {
        let error = EngineError::AmbiguousName {
            kind: "universe".into(),
            name: "orders".into(),
            count: 2,
            uuids: vec!["u-1".into(), "u-2".into()],
        };
        assert_eq!(error.to_string(), "2 universes are named 'orders': u-1, u-2");
    }

    #[test]
    fn validation_diagnostic_is_exposed() {
        let error = EngineError::ValidationFailed {
            message: "invalid cpu".into(),
            diagnostic: json!({ "error": "invalid cpu" }),
        };
        assert_eq!(error.diagnostic(), Some(&json!({ "error": "invalid cpu" })));
        assert!(EngineError::not_found("universe", "x").diagnostic().is_none());
    }
}
