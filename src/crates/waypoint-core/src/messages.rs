//! Message log entries
//!
//! Conversation-style state fields hold a list of [`Message`]s. Each variant
//! carries only what that kind of entry needs; tool requests live on
//! [`Message::Ai`] and tool results on [`Message::Tool`], correlated by
//! [`ToolCall::id`].

use crate::state::StateMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to invoke a named tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Correlation token echoed by the tool result
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub args: serde_json::Map<String, Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Copy of this call with `changes` written over its arguments.
    pub fn with_updated_args(&self, changes: &serde_json::Map<String, Value>) -> Self {
        let mut updated = self.clone();
        for (key, value) in changes {
            updated.args.insert(key.clone(), value.clone());
        }
        updated
    }
}

/// One entry of a message log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Human {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        tool_call_id: String,
        name: String,
    },
    System {
        content: String,
    },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Message::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// An AI turn that requests tools instead of answering
    pub fn ai_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Message::Ai {
            content: String::new(),
            tool_calls,
        }
    }

    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::Human { content }
            | Message::Ai { content, .. }
            | Message::Tool { content, .. }
            | Message::System { content } => content,
        }
    }

    /// Tool calls requested by an AI message; empty for every other variant.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Variant name as serialized (`human`, `ai`, `tool`, `system`)
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Human { .. } => "human",
            Message::Ai { .. } => "ai",
            Message::Tool { .. } => "tool",
            Message::System { .. } => "system",
        }
    }

    /// One transcript line, e.g. `Human: hello`.
    pub fn transcript_line(&self) -> String {
        match self {
            Message::Human { content } => format!("Human: {}", content),
            Message::System { content } => format!("System: {}", content),
            Message::Tool { content, name, .. } => format!("Tool ({}): {}", name, content),
            Message::Ai {
                content,
                tool_calls,
            } if content.is_empty() && !tool_calls.is_empty() => {
                let calls: Vec<String> = tool_calls
                    .iter()
                    .map(|c| {
                        serde_json::json!({"tool": c.name, "args": c.args}).to_string()
                    })
                    .collect();
                format!("AI: {}", calls.join(" "))
            }
            Message::Ai { content, .. } => format!("AI: {}", content),
        }
    }
}

/// Render a message log as a plain-text transcript, one line per message.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::transcript_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode the message list stored under `field`; missing or malformed entries yield `[]`.
pub fn messages_in(state: &StateMap, field: &str) -> Vec<Message> {
    state
        .get(field)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_serialization() {
        let msg = Message::tool("Result: 4", "call_1", "calculator");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "tool", "content": "Result: 4", "tool_call_id": "call_1", "name": "calculator"})
        );

        let ai: Message = serde_json::from_value(json!({"type": "ai", "content": "hi"})).unwrap();
        assert_eq!(ai, Message::ai("hi"));
        assert!(ai.tool_calls().is_empty());
    }

    #[test]
    fn test_updated_args_overwrites_keys() {
        let mut args = serde_json::Map::new();
        args.insert("destination".into(), json!("Paris"));
        args.insert("days".into(), json!(3));
        let call = ToolCall::new("call_1", "get_travel_budget", args);

        let mut changes = serde_json::Map::new();
        changes.insert("days".into(), json!(5));
        let updated = call.with_updated_args(&changes);

        assert_eq!(updated.args["days"], json!(5));
        assert_eq!(updated.args["destination"], json!("Paris"));
        assert_eq!(updated.id, "call_1");
    }

    #[test]
    fn test_transcript() {
        let call = ToolCall::new("c", "calculator", serde_json::Map::new());
        let log = vec![
            Message::human("2+2?"),
            Message::ai_tool_calls(vec![call]),
            Message::tool("Result: 4", "c", "calculator"),
        ];
        let text = render_transcript(&log);
        assert!(text.starts_with("Human: 2+2?\nAI: {"));
        assert!(text.ends_with("Tool (calculator): Result: 4"));
    }

    #[test]
    fn test_messages_in_state() {
        let mut state = StateMap::new();
        state.insert(
            "messages".into(),
            json!([{"type": "human", "content": "hello"}]),
        );
        assert_eq!(messages_in(&state, "messages"), vec![Message::human("hello")]);
        assert!(messages_in(&state, "other").is_empty());
    }
}
