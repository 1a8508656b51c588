//! Tool Agent - model ⇄ tools loop over a message log
//!
//! ```text
//! agent ──(last AI message has a tool call)──→ tools ──→ agent
//!   │
//!   └──(plain answer)──→ END
//! ```
//!
//! The model has no native function calling. The agent node tells it to
//! answer with `{"tool": ..., "args": {...}}` when it needs a tool, then runs
//! the [`TextToolCallDetector`] on the raw reply. A detected call becomes an
//! AI message carrying that one tool call; anything else is appended as the
//! answer.
//!
//! By default the graph pauses before `tools`, so every tool call waits for
//! approval. Rejecting appends [`REJECTION_MARKER`] and ends the turn;
//! approving with modified arguments rewrites the pending call first.
//!
//! ```rust,ignore
//! use waypoint_prebuilt::agents::ToolAgentConfig;
//!
//! let graph = ToolAgentConfig::new(model, search).with_interrupts(false).build()?;
//! ```

use crate::error::Result;
use crate::tools::default_registry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use waypoint_core::messages::render_transcript;
use waypoint_core::{
    FieldKind, FieldSpec, Graph, GraphBuilder, GraphState, Message, ModelCaller, ModelParams,
    SearchCaller, StateSchema, StateUpdate, TextToolCallDetector, ToolCallParser, ToolRegistry,
    END,
};

/// Human message recorded when a pending tool call is rejected
pub const REJECTION_MARKER: &str = "[Tool execution rejected by user]";

/// Low temperature keeps the JSON convention stable
pub const AGENT_TEMPERATURE: f32 = 0.3;
pub const AGENT_MAX_TOKENS: u32 = 4096;

/// State of the tool agent: one accumulating message log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl AgentState {
    /// Last message, if it is an AI message requesting tools
    pub fn pending_tool_message(&self) -> Option<&Message> {
        self.messages
            .last()
            .filter(|m| matches!(m, Message::Ai { .. }) && !m.tool_calls().is_empty())
    }
}

impl GraphState for AgentState {
    fn schema() -> StateSchema {
        StateSchema::new().field(
            FieldSpec::new("messages", FieldKind::Messages)
                .accumulate()
                .label("Messages")
                .default_value(json!([])),
        )
    }
}

/// System prompt describing the tools and the JSON calling convention
pub fn agent_system_prompt(registry: &ToolRegistry) -> String {
    format!(
        r#"You are a helpful AI assistant with access to tools. When you need a tool, reply with ONLY a JSON object in this exact format:
{{"tool": "tool_name", "args": {{"arg1": "value1"}}}}

Available tools:
{}

Rules:
- To use a tool, reply with the JSON object and nothing else.
- If no tool is needed, answer normally in plain text.
- Use a tool when the user asks for information you don't have or for a calculation.

Examples:
User: Search for hotels in Paris
You: {{"tool": "tavily_search_results_json", "args": {{"query": "hotels in Paris"}}}}

User: What's 25 * 48?
You: {{"tool": "calculator", "args": {{"expression": "25*48"}}}}

User: Hello, how are you?
You: I'm doing well! How can I help you today?"#,
        registry.describe()
    )
}

/// Route `agent` to `tools` while the last AI message requests a tool
pub fn should_continue(state: &AgentState) -> &'static str {
    if state.pending_tool_message().is_some() {
        "tools"
    } else {
        END
    }
}

fn messages_update(messages: Vec<Message>) -> waypoint_core::Result<StateUpdate> {
    Ok(StateUpdate::new().try_set("messages", &messages)?)
}

/// Configuration for the tool agent graph
pub struct ToolAgentConfig {
    model: Arc<dyn ModelCaller>,
    registry: ToolRegistry,
    interrupts: bool,
    params: ModelParams,
}

impl ToolAgentConfig {
    /// Agent over the default tools (`tavily_search_results_json`,
    /// `get_travel_budget`, `calculator`)
    pub fn new(model: Arc<dyn ModelCaller>, search: Arc<dyn SearchCaller>) -> Self {
        Self {
            model,
            registry: default_registry(search),
            interrupts: true,
            params: ModelParams::new(AGENT_TEMPERATURE, AGENT_MAX_TOKENS),
        }
    }

    /// Replace the tool set
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Pause before `tools` (default: true)
    pub fn with_interrupts(mut self, interrupts: bool) -> Self {
        self.interrupts = interrupts;
        self
    }

    pub fn build(self) -> Result<Graph> {
        build_tool_agent(self)
    }
}

fn build_tool_agent(config: ToolAgentConfig) -> Result<Graph> {
    let registry = Arc::new(config.registry);
    let system_prompt: Arc<str> = agent_system_prompt(&registry).into();
    let model = config.model;
    let params = config.params;

    let mut builder = GraphBuilder::<AgentState>::new("agent");

    builder.add_node("agent", move |state: AgentState| {
        let model = Arc::clone(&model);
        let system_prompt = Arc::clone(&system_prompt);
        async move {
            let transcript = render_transcript(&state.messages);
            let reply = model.invoke(&system_prompt, &transcript, params).await?;

            let message = match TextToolCallDetector::new().detect(&reply) {
                Some(call) => {
                    info!(tool = %call.name, call_id = %call.id, "Tool call detected");
                    Message::ai_tool_calls(vec![call])
                }
                None => {
                    debug!(chars = reply.len(), "Plain answer");
                    Message::ai(reply)
                }
            };
            messages_update(vec![message])
        }
    });

    let tools = Arc::clone(&registry);
    builder.add_node("tools", move |state: AgentState| {
        let tools = Arc::clone(&tools);
        async move {
            let calls = state
                .pending_tool_message()
                .map(|m| m.tool_calls().to_vec())
                .unwrap_or_default();
            let results = tools.execute_all(&calls).await;
            messages_update(results.iter().map(|r| r.to_message()).collect())
        }
    });

    builder
        .describe_node("agent", "Call the model and detect tool requests")
        .describe_node("tools", "Execute the requested tool calls")
        .set_entry("agent")
        .add_conditional_edge("agent", should_continue, ["tools", END])
        .add_edge("tools", "agent")
        .on_reject(|_state: &AgentState, _node: &str| {
            Some(StateUpdate::new().set(
                "messages",
                json!([{"type": "human", "content": REJECTION_MARKER}]),
            ))
        })
        .on_approval_edit(edit_pending_call);

    if config.interrupts {
        builder.interrupt_before(["tools"]);
    }

    Ok(builder.compile()?)
}

/// Re-issue the pending AI message with its first tool call's arguments
/// overwritten by `args`
fn edit_pending_call(state: &AgentState, _node: &str, args: &Map<String, Value>) -> Option<StateUpdate> {
    let Message::Ai { content, tool_calls } = state.pending_tool_message()? else {
        return None;
    };
    let mut tool_calls = tool_calls.clone();
    let first = tool_calls.first_mut()?;
    *first = first.with_updated_args(args);

    let replacement = Message::Ai {
        content: content.clone(),
        tool_calls,
    };
    serde_json::to_value(vec![replacement])
        .ok()
        .map(|messages| StateUpdate::new().set("messages", messages))
}
