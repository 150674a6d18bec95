//! Error types for the grading and ordering core.
//!
//! Both families are deterministic logic errors: they are returned at the
//! point of the offending call and are never worth retrying.

use thiserror::Error;

use crate::tree::NodeId;

/// Errors produced while interpreting a tolerance specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToleranceError {
    /// The tolerance string is not a numeral or a numeral followed by `%`.
    #[error("malformed tolerance '{input}': {reason}")]
    Parse { input: String, reason: String },
}

impl ToleranceError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        ToleranceError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by container tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The referenced node is absent from the tree (or is the root where a
    /// parented node is required).
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// The move would create a cycle, or moves a node onto itself.
    #[error("invalid move of {source_id} before {target_id}: {reason}")]
    InvalidMove {
        source_id: NodeId,
        target_id: NodeId,
        reason: String,
    },

    /// Two nodes share one identifier.
    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),
}

impl TreeError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            TreeError::NotFound(_) => "not_found",
            TreeError::InvalidMove { .. } => "invalid_move",
            TreeError::DuplicateId(_) => "duplicate_id",
        }
    }
}
