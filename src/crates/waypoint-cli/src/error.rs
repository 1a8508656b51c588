//! Error types for the waypoint CLI

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Graph(#[from] waypoint_core::GraphError),

    #[error(transparent)]
    Checkpoint(#[from] waypoint_checkpoint::CheckpointError),

    #[error(transparent)]
    Prebuilt(#[from] waypoint_prebuilt::PrebuiltError),

    #[error("LLM error: {0}")]
    Llm(#[from] llm::LlmError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
