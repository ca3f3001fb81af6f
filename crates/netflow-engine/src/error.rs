//! Error types for the workflow engine

use thiserror::Error;

use crate::types::{EdgeId, NodeId, NodeKind};
use crate::validation::ValidationIssue;

/// Result type alias using NetflowError
pub type Result<T> = std::result::Result<T, NetflowError>;

/// Errors raised by GraphModel mutators.
///
/// A failed mutation never applies: the caller keeps the model it had.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A node or edge with this ID already exists
    #[error("Duplicate id: '{id}' is already present in the graph")]
    DuplicateId { id: String },

    /// An edge names a node that is not in the graph
    #[error("Edge '{edge_id}' references unknown node '{node_id}'")]
    UnknownEndpoint { edge_id: EdgeId, node_id: NodeId },

    /// No node or edge with this ID exists
    #[error("Not found: '{0}'")]
    NotFound(String),

    /// A configuration patch could not be merged
    #[error("Invalid config patch for node '{node_id}': {reason}")]
    InvalidConfigPatch { node_id: NodeId, reason: String },
}

/// Errors raised by the script compiler
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The graph has outstanding error-severity findings
    #[error("Graph is not compilable: {} validation error(s)", count_errors(.issues))]
    NotCompilable { issues: Vec<ValidationIssue> },

    /// A custom template names a field its kind does not provide
    #[error("Template for '{kind}' references unknown field '{field}'")]
    UnknownTemplateField { kind: NodeKind, field: String },

    /// Per-path expansion produced more steps than allowed
    #[error("Compilation exceeded the limit of {limit} emitted steps")]
    StepLimitExceeded { limit: usize },

    /// Emitted step text grew past the allowed number of bytes
    #[error("Compilation exceeded the limit of {limit} bytes of emitted text")]
    OutputLimitExceeded { limit: usize },

    /// Branch bodies nest deeper than allowed
    #[error("Branch nesting exceeded the limit of {limit} levels")]
    NestingTooDeep { limit: usize },
}

fn count_errors(issues: &[ValidationIssue]) -> usize {
    issues.iter().filter(|i| i.is_error()).count()
}

/// Errors that can occur anywhere in the engine
#[derive(Debug, Error)]
pub enum NetflowError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{IssueCode, Severity, ValidationIssue};

    #[test]
    fn test_error_display() {
        let err = GraphError::UnknownEndpoint {
            edge_id: "e1".to_string(),
            node_id: "ghost".to_string(),
        };
        assert!(err.to_string().contains("e1"));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_not_compilable_counts_only_errors() {
        let err = CompileError::NotCompilable {
            issues: vec![
                ValidationIssue::new(Severity::Error, IssueCode::MissingStart, "Workflow has no start node"),
                ValidationIssue::new(Severity::Warning, IssueCode::FanOut, "Node 'a' has 2 outgoing edges"),
            ],
        };
        assert_eq!(err.to_string(), "Graph is not compilable: 1 validation error(s)");
    }

    #[test]
    fn test_wraps_into_netflow_error() {
        let err: NetflowError = GraphError::NotFound("n1".to_string()).into();
        assert!(matches!(err, NetflowError::Graph(GraphError::NotFound(_))));
    }
}
