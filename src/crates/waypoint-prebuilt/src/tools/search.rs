//! Web search tool backed by a [`SearchCaller`]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use waypoint_core::{SearchCaller, Tool, ToolArgs, ToolError};

/// Results returned per search
pub const SEARCH_TOOL_MAX_RESULTS: usize = 2;

/// `tavily_search_results_json(query)`: a JSON array of `{content}` objects
#[derive(Clone)]
pub struct WebSearchTool {
    search: Arc<dyn SearchCaller>,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn SearchCaller>) -> Self {
        Self { search }
    }
}

impl std::fmt::Debug for WebSearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchTool").finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "tavily_search_results_json"
    }

    fn description(&self) -> &str {
        "Search the web, e.g. {\"query\": \"search query\"}"
    }

    fn arg_names(&self) -> &[&'static str] {
        &["query"]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                reason: "query must be a string".to_string(),
            })?;

        let results = self
            .search
            .search(query, SEARCH_TOOL_MAX_RESULTS)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        serde_json::to_string(&results).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_core::testing::ScriptedSearch;

    fn query(q: &str) -> ToolArgs {
        json!({ "query": q }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_returns_json_array() {
        let search = Arc::new(ScriptedSearch::new(["one", "two", "three"]));
        let tool = WebSearchTool::new(search.clone());

        let out = tool.execute(query("hotels in Paris")).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, json!([{"content": "one"}, {"content": "two"}]));
        assert_eq!(search.queries(), vec!["hotels in Paris"]);
    }

    #[tokio::test]
    async fn test_search_failure_is_tool_error() {
        let tool = WebSearchTool::new(Arc::new(ScriptedSearch::failing()));
        let err = tool.execute(query("anything")).await.unwrap_err();
        assert!(err.to_content().starts_with("Error executing tool:"));
    }
}
