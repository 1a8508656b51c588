//! Editable node prompts
//!
//! Revision pipelines keep each node's system prompt in a state field, so an
//! operator can change how a node behaves mid-thread with an ordinary state
//! edit. [`PromptSet`] is the catalog of those fields for one graph: the
//! built-in defaults plus any overrides.

use crate::error::{PrebuiltError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use waypoint_core::{StateMap, StateUpdate};

/// Built-in prompt for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromptDefault {
    /// State field holding the prompt
    pub key: &'static str,
    /// Node that reads it
    pub node: &'static str,
    pub label: &'static str,
    pub text: &'static str,
}

/// One row of [`PromptSet::all`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEntry {
    pub key: String,
    pub node: String,
    pub label: String,
    pub text: String,
    pub is_default: bool,
}

/// Prompts of one graph: defaults with per-key overrides
#[derive(Debug, Clone)]
pub struct PromptSet {
    graph: String,
    defaults: Vec<PromptDefault>,
    overrides: BTreeMap<String, String>,
}

impl PromptSet {
    pub fn new(graph: impl Into<String>, defaults: impl IntoIterator<Item = PromptDefault>) -> Self {
        Self {
            graph: graph.into(),
            defaults: defaults.into_iter().collect(),
            overrides: BTreeMap::new(),
        }
    }

    /// Adopt the prompt values stored in a thread's state
    pub fn with_state(mut self, state: &StateMap) -> Self {
        for default in &self.defaults {
            if let Some(Value::String(text)) = state.get(default.key) {
                if text != default.text && !text.trim().is_empty() {
                    self.overrides.insert(default.key.to_string(), text.clone());
                }
            }
        }
        self
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.defaults.iter().map(|d| d.key)
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    fn default_for(&self, key: &str) -> Result<&PromptDefault> {
        self.defaults
            .iter()
            .find(|d| d.key == key)
            .ok_or_else(|| PrebuiltError::UnknownPrompt {
                graph: self.graph.clone(),
                key: key.to_string(),
            })
    }

    /// Current text for `key`
    pub fn get(&self, key: &str) -> Result<&str> {
        let default = self.default_for(key)?;
        Ok(self
            .overrides
            .get(key)
            .map(String::as_str)
            .unwrap_or(default.text))
    }

    pub fn update(&mut self, key: &str, text: impl Into<String>) -> Result<()> {
        self.default_for(key)?;
        self.overrides.insert(key.to_string(), text.into());
        Ok(())
    }

    /// Drop the override for `key` and return the restored default
    pub fn reset_to_default(&mut self, key: &str) -> Result<&'static str> {
        let text = self.default_for(key)?.text;
        self.overrides.remove(key);
        Ok(text)
    }

    pub fn all(&self) -> Vec<PromptEntry> {
        self.defaults
            .iter()
            .map(|d| {
                let current = self.overrides.get(d.key);
                PromptEntry {
                    key: d.key.to_string(),
                    node: d.node.to_string(),
                    label: d.label.to_string(),
                    text: current.cloned().unwrap_or_else(|| d.text.to_string()),
                    is_default: current.is_none(),
                }
            })
            .collect()
    }

    /// Update filling every prompt field that `state` leaves unset
    pub fn initialize_in_state(&self, state: &StateMap) -> StateUpdate {
        self.defaults
            .iter()
            .filter(|d| matches!(state.get(d.key), None | Some(Value::Null)))
            .fold(StateUpdate::new(), |update, d| {
                let text = self.overrides.get(d.key).cloned().unwrap_or_else(|| d.text.to_string());
                update.set(d.key, text)
            })
    }

    /// Update writing the current text of every prompt
    pub fn to_update(&self) -> StateUpdate {
        self.all()
            .into_iter()
            .fold(StateUpdate::new(), |update, entry| update.set(entry.key, entry.text))
    }
}
