//! Error types for graph construction and execution
//!
//! ```text
//! GraphError
//! ├── Validation          - graph definition is malformed (build time)
//! ├── StepExecution       - a step failed or timed out; thread stays retryable
//! ├── InvalidRoute        - a conditional selector returned an undeclared target
//! ├── UnknownNode         - a node name that the graph does not define
//! ├── ThreadNotFound      - operation needs an existing thread
//! ├── CheckpointNotFound  - requested checkpoint id is not in the thread
//! ├── NoPendingAction     - resume on a thread that is not paused
//! ├── RecursionLimit      - one call executed more steps than allowed
//! ├── State               - reducer could not merge an update
//! ├── Checkpoint          - storage backend failure
//! └── Serialization       - JSON conversion failure
//! ```
//!
//! Only [`GraphError::StepExecution`] is considered part of the normal thread
//! lifecycle: the executor reports it as an `error` status instead of returning it.

use crate::state::StateError;
use thiserror::Error;
use waypoint_checkpoint::CheckpointError;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or driving a graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// The graph definition is inconsistent (missing nodes, dangling edges, ...)
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A step function failed or exceeded its timeout.
    ///
    /// No checkpoint is written; the thread stays positioned at `node`.
    #[error("Step '{node}' failed: {message}")]
    StepExecution { node: String, message: String },

    /// A conditional edge produced a target that was not declared for it
    #[error("Node '{node}' routed to undeclared target '{target}'")]
    InvalidRoute { node: String, target: String },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    /// The checkpoint id does not exist for this thread
    #[error("Checkpoint '{checkpoint_id}' not found in thread '{thread_id}'")]
    CheckpointNotFound {
        thread_id: String,
        checkpoint_id: String,
    },

    /// `resume` was called on a thread that is not paused before a node
    #[error("No pending action to resume for thread '{0}'")]
    NoPendingAction(String),

    #[error("Recursion limit of {limit} steps reached in thread '{thread_id}'")]
    RecursionLimit { thread_id: String, limit: usize },

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(CheckpointError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a step execution error
    pub fn step(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepExecution {
            node: node.into(),
            message: message.into(),
        }
    }

    /// True for failures that leave the thread retryable at the same node.
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::StepExecution { .. })
    }
}

impl From<CheckpointError> for GraphError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::NotFound {
                thread_id,
                checkpoint_id,
            } => GraphError::CheckpointNotFound {
                thread_id,
                checkpoint_id,
            },
            other => GraphError::Checkpoint(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_checkpoint_not_found() {
        let err: GraphError = CheckpointError::not_found("t-1", "c-9").into();
        assert!(matches!(
            err,
            GraphError::CheckpointNotFound { ref thread_id, ref checkpoint_id }
                if thread_id == "t-1" && checkpoint_id == "c-9"
        ));
    }

    #[test]
    fn test_step_error_display() {
        let err = GraphError::step("generate", "model unavailable");
        assert_eq!(err.to_string(), "Step 'generate' failed: model unavailable");
        assert!(err.is_step_failure());
    }
}
