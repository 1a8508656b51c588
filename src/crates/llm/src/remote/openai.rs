//! OpenAI-compatible chat client.
//!
//! Works with any endpoint that speaks the `/chat/completions` protocol
//! (OpenAI, OpenRouter, vLLM, LM Studio, ...).
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::config::RemoteLlmConfig;
//!
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o-mini")?;
//! let client = OpenAiClient::new(config)?;
//! ```

use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waypoint_core::{ModelCaller, ModelParams};

/// OpenAI-compatible API client.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, system_prompt: &str, user_content: &str, params: ModelParams) -> OpenAiRequest {
        OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: Some(system_prompt.to_string()),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: Some(user_content.to_string()),
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_output_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl ModelCaller for OpenAiClient {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_content: &str,
        params: ModelParams,
    ) -> waypoint_core::Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let req_body = self.build_request(system_prompt, user_content, params);
        debug!(model = %req_body.model, "Calling chat completions");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&req_body)
            .send()
            .await
            .map_err(LlmError::HttpError)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("OpenAI", status, error_text).into());
        }

        let openai_resp: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(first_content(openai_resp)?)
    }
}

fn first_content(response: OpenAiResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let client = OpenAiClient::new(RemoteLlmConfig::new(
            "sk-test",
            "https://api.openai.com/v1",
            "gpt-4o-mini",
        ))
        .unwrap();
        let body = serde_json::to_value(client.build_request("sys", "hi", ModelParams::new(0.7, 256))).unwrap();

        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["max_tokens"], json!(256));
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["content"], json!("hi"));
    }

    #[test]
    fn test_first_content() {
        let parsed: OpenAiResponse = serde_json::from_value(json!({
            "id": "x",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris"}}]
        }))
        .unwrap();
        assert_eq!(first_content(parsed).unwrap(), "Paris");

        let empty: OpenAiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(first_content(empty).is_err());
    }
}
