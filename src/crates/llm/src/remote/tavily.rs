//! Tavily web search client.
//!
//! `POST {base_url}/search` with the query and `max_results`; only the
//! `content` of each hit is kept.

use crate::config::SearchConfig;
use crate::error::{LlmError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waypoint_core::{SearchCaller, SearchResult};

/// Tavily search API client.
#[derive(Clone, Debug)]
pub struct TavilyClient {
    config: SearchConfig,
    client: Client,
}

impl TavilyClient {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Run one search and return the raw hits.
    pub async fn search_raw(&self, query: &str, max_results: usize) -> Result<Vec<TavilyHit>> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let body = TavilyRequest {
            api_key: &self.config.api_key,
            query,
            max_results,
        };
        debug!(query, max_results, "Calling Tavily");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Tavily", status, error_text));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl SearchCaller for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> waypoint_core::Result<Vec<SearchResult>> {
        Ok(self
            .search_raw(query, max_results)
            .await?
            .into_iter()
            .map(|hit| SearchResult::new(hit.content))
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

/// One Tavily search hit
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TavilyHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}
