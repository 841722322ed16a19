//! Engine error types
//!
//! `NotFound`, `InvalidAmount` and `InvalidParticipant` are caller errors:
//! they are raised before any mutation and the caller may retry with
//! corrected input. `InvariantViolation` and `ConsolidationAborted` indicate
//! a structural problem and leave the tree as it was before the operation.

use thiserror::Error;

use crate::core_types::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid participant: {0}")]
    InvalidParticipant(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Consolidation aborted: {0}")]
    ConsolidationAborted(String),
}

impl EngineError {
    /// Caller errors are rejected before mutation and are safe to retry
    /// with corrected input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::InvalidAmount(_)
                | EngineError::InvalidParticipant(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
