//! Configuration schema for the waypoint CLI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use waypoint_core::ExecutorConfig;

/// Main waypoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WaypointConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: WebSearchConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Checkpoint database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (relative to ~/.waypoint or absolute)
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "waypoint.db".to_string(),
        }
    }
}

/// Model provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// "ollama" or "openai" (any OpenAI-compatible endpoint)
    pub provider: String,

    /// API base URL; the provider's default when unset
    pub base_url: Option<String>,

    pub model: String,

    /// Required by "openai" (supports `${VAR}`)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: None,
            model: "llama3.1".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// Web search provider (Tavily)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Tavily API key (supports `${VAR}`); search is disabled without one
    pub api_key: Option<String>,

    pub base_url: Option<String>,

    /// Upper bound on results per query
    pub max_results: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: Some("${TAVILY_API_KEY}".to_string()),
            base_url: None,
            max_results: 2,
        }
    }
}

/// Executor limits and graph options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-step timeout in seconds; 0 disables it
    pub step_timeout_secs: u64,

    /// Steps one command may run before giving up
    pub max_steps: usize,

    /// `max_revisions` for new essay and trip threads
    pub default_max_revisions: i64,

    /// Pause before approval nodes
    pub interrupts: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 300,
            max_steps: 25,
            default_max_revisions: 2,
            interrupts: true,
        }
    }
}

impl ExecutionConfig {
    pub fn executor_config(&self) -> ExecutorConfig {
        let config = ExecutorConfig::default().with_max_steps(self.max_steps);
        if self.step_timeout_secs == 0 {
            config
        } else {
            config.with_step_timeout(Duration::from_secs(self.step_timeout_secs))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn" or "error"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl WaypointConfig {
    /// Resolve `${VAR_NAME}` values from the environment.
    ///
    /// Unset variables keep the placeholder, except for API keys, which
    /// become `None`.
    pub fn resolve_env_vars(&mut self) {
        self.database.path = expand_env_var(&self.database.path);
        self.llm.base_url = self.llm.base_url.as_deref().map(expand_env_var);
        self.llm.api_key = self.llm.api_key.as_deref().and_then(expand_secret);
        self.search.base_url = self.search.base_url.as_deref().map(expand_env_var);
        self.search.api_key = self.search.api_key.as_deref().and_then(expand_secret);
    }

    /// Resolved database path; relative paths live under ~/.waypoint
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.path);
        if path.is_absolute() {
            return path;
        }
        match dirs::home_dir() {
            Some(home) => home.join(".waypoint").join(path),
            None => path,
        }
    }
}

fn env_var_name(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}

fn expand_env_var(value: &str) -> String {
    match env_var_name(value) {
        Some(name) => std::env::var(name).unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}

fn expand_secret(value: &str) -> Option<String> {
    match env_var_name(value) {
        Some(name) => std::env::var(name).ok().filter(|v| !v.is_empty()),
        None => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WaypointConfig::default();
        assert_eq!(config.database.path, "waypoint.db");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.execution.max_steps, 25);
        assert_eq!(config.execution.default_max_revisions, 2);
        assert_eq!(config.search.max_results, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: WaypointConfig = toml::from_str("[llm]\nmodel = \"qwen2.5\"\n").unwrap();
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.timeout_secs, 120);
    }

    #[test]
    fn test_env_var_expansion() {
        let mut config = WaypointConfig::default();
        config.llm.api_key = Some("${WAYPOINT_SCHEMA_TEST_KEY}".to_string());
        config.llm.base_url = Some("${WAYPOINT_SCHEMA_TEST_UNSET}".to_string());
        config.search.api_key = Some("${WAYPOINT_SCHEMA_TEST_UNSET}".to_string());

        std::env::set_var("WAYPOINT_SCHEMA_TEST_KEY", "sk-123");
        config.resolve_env_vars();
        std::env::remove_var("WAYPOINT_SCHEMA_TEST_KEY");

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-123"));
        assert_eq!(config.llm.base_url.as_deref(), Some("${WAYPOINT_SCHEMA_TEST_UNSET}"));
        assert_eq!(config.search.api_key, None);
    }

    #[test]
    fn test_database_path() {
        let mut config = WaypointConfig::default();
        assert!(config.database_path().ends_with("waypoint.db"));

        config.database.path = "/tmp/threads.db".to_string();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/threads.db"));
    }

    #[test]
    fn test_executor_config() {
        let mut execution = ExecutionConfig::default();
        let config = execution.executor_config();
        assert_eq!(config.step_timeout, Some(Duration::from_secs(300)));

        execution.step_timeout_secs = 0;
        execution.max_steps = 7;
        let config = execution.executor_config();
        assert_eq!(config.step_timeout, None);
        assert_eq!(config.max_steps, 7);
    }
}
