//! Error Types - Prebuilt Graph Errors
//!
//! Errors raised while selecting, building or configuring one of the
//! prebuilt graphs. Failures inside a running step are ordinary
//! [`GraphError`]s and never pass through here.

use thiserror::Error;
use waypoint_core::GraphError;

/// Result type for prebuilt operations
pub type Result<T> = std::result::Result<T, PrebuiltError>;

/// Errors that can occur in prebuilt components
#[derive(Error, Debug)]
pub enum PrebuiltError {
    /// Graph name not in the catalog
    #[error("Unknown graph '{0}' (expected one of: agent, essay, trip)")]
    UnknownGraph(String),

    /// Prompt key not defined for the graph
    #[error("Graph '{graph}' has no prompt '{key}'")]
    UnknownPrompt { graph: String, key: String },

    /// `max_revisions` must allow at least one draft
    #[error("max_revisions must be at least 1, got {0}")]
    InvalidMaxRevisions(i64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}
