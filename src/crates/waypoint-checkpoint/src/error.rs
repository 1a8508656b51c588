//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint with this id exists for the thread
    #[error("Checkpoint not found: {checkpoint_id} (thread {thread_id})")]
    NotFound {
        thread_id: String,
        checkpoint_id: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rejected append (empty thread id, unknown parent, ...)
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    /// Build a [`CheckpointError::NotFound`] for a thread / checkpoint pair.
    pub fn not_found(thread_id: impl Into<String>, checkpoint_id: impl Into<String>) -> Self {
        Self::NotFound {
            thread_id: thread_id.into(),
            checkpoint_id: checkpoint_id.into(),
        }
    }

    /// True if this error means the requested checkpoint does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
