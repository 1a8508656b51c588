//! Tools available to the tool agent
//!
//! | Tool | Arguments | Output |
//! |------|-----------|--------|
//! | `tavily_search_results_json` | `query` | JSON array of `{content}` |
//! | `get_travel_budget` | `destination`, `days` | budget sentence |
//! | `calculator` | `expression` | `Result: <value>` |
//!
//! Failures never escape the registry: they come back as `Error...` tool
//! messages the agent can react to.

pub mod budget;
pub mod calculator;
pub mod search;

pub use budget::TravelBudgetTool;
pub use calculator::CalculatorTool;
pub use search::WebSearchTool;

use std::sync::Arc;
use waypoint_core::{SearchCaller, ToolRegistry};

/// Registry with the three agent tools, in prompt order
pub fn default_registry(search: Arc<dyn SearchCaller>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(WebSearchTool::new(search)))
        .register(Arc::new(TravelBudgetTool))
        .register(Arc::new(CalculatorTool));
    registry
}
