//! Wiring from configuration to a ready executor

use crate::config::{LlmConfig, WaypointConfig, WebSearchConfig};
use crate::error::{CliError, Result};
use async_trait::async_trait;
use llm::config::DEFAULT_OLLAMA_URL;
use llm::{LocalLlmConfig, OllamaClient, OpenAiClient, RemoteLlmConfig, SearchConfig, TavilyClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use waypoint_checkpoint::{CheckpointStore, SqliteCheckpointStore};
use waypoint_core::{Executor, GraphError, ModelCaller, SearchCaller, SearchResult};
use waypoint_prebuilt::GraphKind;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Open store plus the collaborators every graph needs
pub struct AppContext {
    config: WaypointConfig,
    store: Arc<SqliteCheckpointStore>,
    model: Arc<dyn ModelCaller>,
    search: Arc<dyn SearchCaller>,
}

impl AppContext {
    /// Open the checkpoint database and build the clients
    pub async fn open(config: WaypointConfig) -> Result<Self> {
        let path = config.database_path();
        let store = Arc::new(SqliteCheckpointStore::open(&path).await?);
        let model = build_model(&config.llm)?;
        let search = build_search(&config.search)?;
        info!(
            database = %path.display(),
            provider = %config.llm.provider,
            model = %config.llm.model,
            "Context ready"
        );
        Ok(Self::from_parts(config, store, model, search))
    }

    pub fn from_parts(
        config: WaypointConfig,
        store: Arc<SqliteCheckpointStore>,
        model: Arc<dyn ModelCaller>,
        search: Arc<dyn SearchCaller>,
    ) -> Self {
        Self {
            config,
            store,
            model,
            search,
        }
    }

    pub fn config(&self) -> &WaypointConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn CheckpointStore> {
        self.store.clone()
    }

    /// Executor for `kind`; every command on a thread must use the same graph
    pub fn executor(&self, kind: GraphKind, interrupts: bool) -> Result<Executor> {
        let graph = kind.build(self.model.clone(), self.search.clone(), interrupts)?;
        Ok(Executor::with_config(
            Arc::new(graph),
            self.store(),
            self.config.execution.executor_config(),
        ))
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Model client for the configured provider
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn ModelCaller>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
            let client =
                OllamaClient::new(LocalLlmConfig::new(base_url, &config.model).with_timeout(timeout))?;
            Ok(Arc::new(client))
        }
        "openai" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                CliError::Config("llm.api_key is required for the openai provider".to_string())
            })?;
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
            let client = OpenAiClient::new(
                RemoteLlmConfig::new(api_key, base_url, &config.model).with_timeout(timeout),
            )?;
            Ok(Arc::new(client))
        }
        other => Err(CliError::Config(format!(
            "Unknown LLM provider '{}' (expected ollama or openai)",
            other
        ))),
    }
}

/// Tavily client capped at `max_results`, or a provider that fails every query
pub fn build_search(config: &WebSearchConfig) -> Result<Arc<dyn SearchCaller>> {
    let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        warn!("No search API key configured; research steps will find nothing");
        return Ok(Arc::new(DisabledSearch));
    };

    let mut search_config = SearchConfig::new(api_key);
    if let Some(base_url) = &config.base_url {
        search_config = search_config.with_base_url(base_url);
    }
    Ok(Arc::new(CappedSearch {
        inner: Arc::new(TavilyClient::new(search_config)?),
        max_results: config.max_results,
    }))
}

/// Clamps every request to a configured result count
pub struct CappedSearch {
    inner: Arc<dyn SearchCaller>,
    max_results: usize,
}

#[async_trait]
impl SearchCaller for CappedSearch {
    async fn search(&self, query: &str, max_results: usize) -> waypoint_core::Result<Vec<SearchResult>> {
        self.inner.search(query, max_results.min(self.max_results)).await
    }
}

/// Used when no search key is configured
pub struct DisabledSearch;

#[async_trait]
impl SearchCaller for DisabledSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> waypoint_core::Result<Vec<SearchResult>> {
        Err(GraphError::step("search", "web search is not configured"))
    }
}
