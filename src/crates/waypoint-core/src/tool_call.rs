//! Tool-call detection in raw model output
//!
//! Models that lack native function calling are prompted to answer with a
//! single JSON object of the form `{"tool": "<name>", "args": {...}}`.
//! [`TextToolCallDetector`] recognizes that form in two layers:
//!
//! 1. **Strict**: the trimmed text is exactly one JSON object whose keys are
//!    `tool` (a string) and `args` (an object).
//! 2. **Embedded**: a regex finds the same shape inside surrounding prose. The
//!    pattern does not allow nested braces in `args`, so nested arguments are
//!    only recognized by the strict layer.
//!
//! Anything else is plain text. Detection never fails; it only finds or
//! doesn't find a call.

use crate::messages::ToolCall;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Finds a tool request in raw model text
pub trait ToolCallParser: Send + Sync {
    fn detect(&self, raw: &str) -> Option<ToolCall>;
}

/// Two-layer detector for the `{"tool": ..., "args": {...}}` convention
#[derive(Debug, Clone, Copy, Default)]
pub struct TextToolCallDetector;

const EMBEDDED_PATTERN: &str = r#"\{\s*"tool":\s*"([^"]+)",\s*"args":\s*(\{[^}]*\})\s*\}"#;

fn embedded_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(EMBEDDED_PATTERN).ok()).as_ref()
}

impl TextToolCallDetector {
    pub fn new() -> Self {
        Self
    }

    fn strict(text: &str) -> Option<(String, serde_json::Map<String, Value>)> {
        if !(text.starts_with('{') && text.ends_with('}')) {
            return None;
        }
        let Value::Object(mut object) = serde_json::from_str::<Value>(text).ok()? else {
            return None;
        };
        if object.len() != 2 {
            return None;
        }
        let name = match object.remove("tool")? {
            Value::String(name) => name,
            _ => return None,
        };
        match object.remove("args")? {
            Value::Object(args) => Some((name, args)),
            _ => None,
        }
    }

    fn embedded(text: &str) -> Option<(String, serde_json::Map<String, Value>)> {
        let captures = embedded_regex()?.captures(text)?;
        let name = captures.get(1)?.as_str().to_string();
        match serde_json::from_str::<Value>(captures.get(2)?.as_str()).ok()? {
            Value::Object(args) => Some((name, args)),
            _ => None,
        }
    }
}

impl ToolCallParser for TextToolCallDetector {
    fn detect(&self, raw: &str) -> Option<ToolCall> {
        let text = raw.trim();
        let (name, args) = Self::strict(text).or_else(|| Self::embedded(text))?;
        Some(ToolCall::new(call_id_for(text), name, args))
    }
}

/// Deterministic call id derived from the model text: `call_<0..99999>`.
pub fn call_id_for(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("call_{}", u64::from_be_bytes(prefix) % 100_000)
}
