//! Client configuration.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Tavily endpoint.
pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

/// Configuration for local LLM providers (Ollama).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLlmConfig {
    /// Base URL for the local LLM server, e.g. "http://localhost:11434".
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl LocalLlmConfig {
    /// Create a new local LLM configuration.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Read `OLLAMA_BASE_URL` and `OLLAMA_MODEL`, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.1".to_string());
        Self::new(base_url, model)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for OpenAI-compatible remote chat APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API, e.g. "https://api.openai.com/v1".
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl RemoteLlmConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Create configuration with the API key taken from `env_var`.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for the Tavily search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api_key: String,

    #[serde(default = "default_tavily_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl SearchConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_tavily_url(),
            timeout: default_timeout(),
        }
    }

    /// Read the key from `TAVILY_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| LlmError::ApiKeyNotFound("Environment variable: TAVILY_API_KEY".into()))?;
        if api_key.trim().is_empty() {
            return Err(LlmError::ConfigError("TAVILY_API_KEY is empty".into()));
        }
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_tavily_url() -> String {
    DEFAULT_TAVILY_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_config_builder() {
        let config = LocalLlmConfig::new("http://localhost:11434", "llama3.1")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3.1");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_remote_config_missing_key() {
        let err = RemoteLlmConfig::from_env(
            "WAYPOINT_TEST_KEY_THAT_IS_NOT_SET",
            "https://api.openai.com/v1",
            "gpt-4o-mini",
        )
        .unwrap_err();
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::new("tvly-key").with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, DEFAULT_TAVILY_URL);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
