//! External collaborator traits
//!
//! Step functions reach language models and search providers only through
//! these traits, so graphs can be driven by real clients (the `llm` crate) or
//! by scripted doubles (`crate::testing`) without change.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters for one model call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 4096,
        }
    }
}

impl ModelParams {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
        }
    }
}

/// A text-in, text-out language model.
///
/// Errors surface as step failures in the calling node.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_content: &str,
        params: ModelParams,
    ) -> Result<String>;
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
}

impl SearchResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A web search provider.
///
/// Research steps treat an error as zero results for that query.
#[async_trait]
pub trait SearchCaller: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}
