//! Ollama client implementation.
//!
//! Sends one non-streaming `/api/chat` request per invocation with a system
//! message and a user message. `temperature` and `max_output_tokens` map to
//! Ollama's `temperature` and `num_predict` options.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::local::OllamaClient;
//! use llm::config::LocalLlmConfig;
//! use waypoint_core::{ModelCaller, ModelParams};
//!
//! let client = OllamaClient::new(LocalLlmConfig::new("http://localhost:11434", "llama3.1"))?;
//! let reply = client.invoke("You are terse.", "Hello!", ModelParams::default()).await?;
//! ```

use crate::config::LocalLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waypoint_core::{ModelCaller, ModelParams};

/// Ollama client for local LLM inference.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    config: LocalLlmConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: LocalLlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Check if Ollama server is running.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn build_request(&self, system_prompt: &str, user_content: &str, params: ModelParams) -> OllamaRequest {
        OllamaRequest {
            model: self.config.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user_content.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_output_tokens,
            },
        }
    }

    async fn chat(&self, request: &OllamaRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));
        debug!(model = %request.model, "Calling Ollama");

        let response = self.client.post(&url).json(request).send().await.map_err(|e| {
            if e.is_connect() {
                LlmError::ServiceUnavailable(format!("Ollama is not reachable at {}", self.config.base_url))
            } else {
                LlmError::HttpError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Ollama", status, error_text));
        }

        let ollama_resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        debug!(
            prompt_tokens = ollama_resp.prompt_eval_count.unwrap_or(0),
            output_tokens = ollama_resp.eval_count.unwrap_or(0),
            "Ollama call completed"
        );
        Ok(ollama_resp.message.content)
    }
}

#[async_trait]
impl ModelCaller for OllamaClient {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_content: &str,
        params: ModelParams,
    ) -> waypoint_core::Result<String> {
        let request = self.build_request(system_prompt, user_content, params);
        Ok(self.chat(&request).await?)
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn client() -> OllamaClient {
        OllamaClient::new(LocalLlmConfig::new("http://localhost:11434", "llama3.1")).unwrap()
    }

    #[test]
    fn test_request_body() {
        let request = client().build_request("be brief", "hi", ModelParams::new(0.3, 4096));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], json!("llama3.1"));
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hi"}));
        assert_eq!(body["options"]["num_predict"], json!(4096));
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_response_parsing() {
        let raw = json!({
            "model": "llama3.1",
            "message": {"role": "assistant", "content": "Hello there"},
            "done": true,
            "eval_count": 3
        });
        let parsed: OllamaResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.message.content, "Hello there");
        assert_eq!(parsed.eval_count, Some(3));
        assert_eq!(parsed.prompt_eval_count, None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_step_failure() {
        let config = LocalLlmConfig::new("http://127.0.0.1:9", "llama3.1")
            .with_timeout(Duration::from_secs(2));
        let client = OllamaClient::new(config).unwrap();

        let err = client
            .invoke("system", "user", ModelParams::default())
            .await
            .unwrap_err();
        assert!(err.is_step_failure());
        assert!(!client.check_health().await);
    }
}
