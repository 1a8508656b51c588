//! Graph catalog: pick a prebuilt graph by name

use crate::agents::{essay_writer_graph, trip_planner_graph, ToolAgentConfig, ESSAY, TRIP};
use crate::error::{PrebuiltError, Result};
use crate::prompts::PromptSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use waypoint_core::{Graph, Message, ModelCaller, SearchCaller, StateMap, StateUpdate};

/// The prebuilt graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Agent,
    Essay,
    Trip,
}

impl GraphKind {
    pub const ALL: [GraphKind; 3] = [GraphKind::Agent, GraphKind::Essay, GraphKind::Trip];

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphKind::Agent => "agent",
            GraphKind::Essay => "essay",
            GraphKind::Trip => "trip",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            GraphKind::Agent => "Chat agent with search, travel budget and calculator tools",
            GraphKind::Essay => "Essay writer with research and critique revisions",
            GraphKind::Trip => "Trip planner with research and advisor revisions",
        }
    }

    pub fn build(
        &self,
        model: Arc<dyn ModelCaller>,
        search: Arc<dyn SearchCaller>,
        interrupts: bool,
    ) -> Result<Graph> {
        match self {
            GraphKind::Agent => ToolAgentConfig::new(model, search)
                .with_interrupts(interrupts)
                .build(),
            GraphKind::Essay => essay_writer_graph(model, search, interrupts),
            GraphKind::Trip => trip_planner_graph(model, search, interrupts),
        }
    }

    /// Editable prompts; the agent has none
    pub fn prompts(&self) -> PromptSet {
        match self {
            GraphKind::Agent => PromptSet::new("agent", []),
            GraphKind::Essay => ESSAY.prompt_set(),
            GraphKind::Trip => TRIP.prompt_set(),
        }
    }

    /// Input that starts a new turn with `text`.
    ///
    /// For the agent that is a human message; for the revision pipelines it
    /// is a fresh `task` with the revision counter reset, plus any prompt
    /// fields `existing` leaves unset. A revision budget below 1 is rejected.
    pub fn initial_input(
        &self,
        text: &str,
        max_revisions: Option<i64>,
        existing: Option<&StateMap>,
    ) -> Result<StateUpdate> {
        if let Some(max) = max_revisions.filter(|max| *max < 1) {
            return Err(PrebuiltError::InvalidMaxRevisions(max));
        }
        let update = match self {
            GraphKind::Agent => StateUpdate::new().set(
                "messages",
                json!([{"type": "human", "content": text}]),
            ),
            GraphKind::Essay | GraphKind::Trip => {
                let empty = StateMap::new();
                let mut update = self
                    .prompts()
                    .initialize_in_state(existing.unwrap_or(&empty))
                    .into_map();
                update.insert("task".to_string(), json!(text));
                update.insert("revision_number".to_string(), json!(0));
                if let Some(max) = max_revisions {
                    update.insert("max_revisions".to_string(), json!(max));
                }
                StateUpdate::from(update)
            }
        };
        Ok(update)
    }

    /// Latest user-facing output of a thread
    pub fn final_output(&self, state: &StateMap) -> Option<String> {
        match self {
            GraphKind::Agent => waypoint_core::messages::messages_in(state, "messages")
                .iter()
                .rev()
                .find(|m| matches!(m, Message::Ai { .. }) && m.tool_calls().is_empty())
                .map(|m| m.content().to_string()),
            GraphKind::Essay | GraphKind::Trip => state
                .get("draft")
                .and_then(|v| v.as_str())
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphKind {
    type Err = PrebuiltError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "agent" => Ok(GraphKind::Agent),
            "essay" | "essay_writer" => Ok(GraphKind::Essay),
            "trip" | "trip_planner" => Ok(GraphKind::Trip),
            other => Err(PrebuiltError::UnknownGraph(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("agent".parse::<GraphKind>().unwrap(), GraphKind::Agent);
        assert_eq!("Essay".parse::<GraphKind>().unwrap(), GraphKind::Essay);
        assert_eq!("trip_planner".parse::<GraphKind>().unwrap(), GraphKind::Trip);
        assert!(matches!(
            "chess".parse::<GraphKind>(),
            Err(PrebuiltError::UnknownGraph(_))
        ));
        for kind in GraphKind::ALL {
            assert_eq!(kind.to_string().parse::<GraphKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_initial_input() {
        let update = GraphKind::Agent.initial_input("hi", None, None).unwrap();
        let messages: Vec<Message> =
            serde_json::from_value(update.get("messages").cloned().unwrap()).unwrap();
        assert_eq!(messages, vec![Message::human("hi")]);

        let update = GraphKind::Essay.initial_input("Rust", Some(3), None).unwrap();
        assert_eq!(update.get("task"), Some(&json!("Rust")));
        assert_eq!(update.get("max_revisions"), Some(&json!(3)));
        assert!(update.get("planner_prompt").is_some());

        let existing: StateMap = json!({"planner_prompt": "mine"}).as_object().cloned().unwrap();
        let update = GraphKind::Trip
            .initial_input("Bali", None, Some(&existing))
            .unwrap();
        assert_eq!(update.get("planner_prompt"), None);
        assert!(update.get("travel_plan_prompt").is_some());
        assert_eq!(update.get("max_revisions"), None);
    }

    #[test]
    fn test_initial_input_rejects_empty_revision_budget() {
        for max in [0, -1, -10] {
            for kind in GraphKind::ALL {
                assert!(matches!(
                    kind.initial_input("Rust", Some(max), None),
                    Err(PrebuiltError::InvalidMaxRevisions(m)) if m == max
                ));
            }
        }
        assert!(GraphKind::Essay.initial_input("Rust", Some(1), None).is_ok());
    }

    #[test]
    fn test_prompts_per_graph() {
        assert!(GraphKind::Agent.prompts().is_empty());
        let keys: Vec<&str> = GraphKind::Trip.prompts().keys().collect();
        assert_eq!(
            keys,
            vec![
                "planner_prompt",
                "travel_plan_prompt",
                "generator_prompt",
                "critic_prompt",
                "travel_critique_prompt"
            ]
        );
    }
}
