//! Error types for model and search clients.

use thiserror::Error;
use waypoint_core::GraphError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors raised by model and search clients.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request or response body did not (de)serialize
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 401/403 from the provider
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// A `from_env` constructor found no key
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Endpoint unreachable or a 502-504 gateway status
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// 2xx response without the expected content
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success status
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Transient failures: worth re-running the step
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::HttpError(_) | LlmError::ServiceUnavailable(_) | LlmError::RateLimitExceeded(_)
        )
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// Map a non-success HTTP status to an error.
    pub(crate) fn from_status(provider: &str, status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::AuthenticationError(format!("{} rejected credentials: {}", provider, body)),
            429 => LlmError::RateLimitExceeded(format!("{}: {}", provider, body)),
            502..=504 => LlmError::ServiceUnavailable(format!("{} returned {}", provider, status)),
            _ => LlmError::ProviderError(format!("{} API error {}: {}", provider, status, body)),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

/// Client failures inside a step are step failures; the executor attributes
/// them to the running node.
impl From<LlmError> for GraphError {
    fn from(err: LlmError) -> Self {
        GraphError::step("llm", err.to_string())
    }
}
