//! Per-thread state inspection and editing
//!
//! [`StateManager`] binds an [`Executor`] to one thread and exposes the
//! operator-facing view of it: field values described by the graph's schema,
//! a compact history, and manual edits that go through the same reducer as
//! every step.

use crate::error::{GraphError, Result};
use crate::executor::{Executor, ThreadSnapshot};
use crate::graph::NodeId;
use crate::state::{FieldKind, MergePolicy, StateMap, StateUpdate};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use waypoint_checkpoint::{CheckpointId, CheckpointSource};

/// Default width for values in [`StateManager::snapshots_summary`]
pub const DEFAULT_TRUNCATE: usize = 80;

/// One row of a thread's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// 0 is the most recent checkpoint
    pub index: usize,
    pub checkpoint_id: CheckpointId,
    pub parent_id: Option<CheckpointId>,
    pub next: Vec<NodeId>,
    pub step: i64,
    pub source: CheckpointSource,
    pub writer: Option<String>,
    /// Length of the `messages` field, when the state has one
    pub messages_count: usize,
}

/// A schema field with its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldKind,
    pub policy: MergePolicy,
    pub label: String,
    pub value: Value,
    pub editable: bool,
}

/// Inspection handle for one thread
pub struct StateManager<'a> {
    executor: &'a Executor,
    thread_id: String,
}

impl<'a> StateManager<'a> {
    pub fn new(executor: &'a Executor, thread_id: impl Into<String>) -> Self {
        Self {
            executor,
            thread_id: thread_id.into(),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub async fn current_state(&self) -> Result<ThreadSnapshot> {
        self.executor.get_state(&self.thread_id).await
    }

    /// Current value of one field, if set
    pub async fn get_value(&self, field: &str) -> Result<Option<Value>> {
        Ok(self.current_state().await?.state.get(field).cloned())
    }

    pub async fn update_value(
        &self,
        field: &str,
        value: Value,
        as_node: Option<&str>,
    ) -> Result<ThreadSnapshot> {
        self.update_values(StateUpdate::new().set(field, value).into_map(), as_node)
            .await
    }

    /// Apply several field edits as one checkpoint.
    ///
    /// Fields the schema marks read-only are refused.
    pub async fn update_values(
        &self,
        values: StateMap,
        as_node: Option<&str>,
    ) -> Result<ThreadSnapshot> {
        let schema = self.executor.graph().schema();
        if let Some(field) = values
            .keys()
            .find(|key| schema.get(key).is_some_and(|spec| !spec.editable))
        {
            return Err(GraphError::Validation(format!(
                "Field '{}' is read-only",
                field
            )));
        }
        self.executor
            .update_state(&self.thread_id, StateUpdate::from(values), as_node)
            .await
    }

    /// State stored at one historical checkpoint
    pub async fn checkpoint_state(&self, checkpoint_id: &str) -> Result<StateMap> {
        Ok(self
            .executor
            .get_checkpoint(&self.thread_id, checkpoint_id)
            .await?
            .state)
    }

    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let checkpoints = self.executor.get_history(&self.thread_id, limit).await?;
        Ok(checkpoints
            .into_iter()
            .enumerate()
            .map(|(index, checkpoint)| HistoryEntry {
                index,
                messages_count: checkpoint
                    .state
                    .get("messages")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
                checkpoint_id: checkpoint.id,
                parent_id: checkpoint.parent_id,
                next: checkpoint.next,
                step: checkpoint.metadata.step,
                source: checkpoint.metadata.source,
                writer: checkpoint.metadata.writer,
            })
            .collect())
    }

    /// Every declared field with its current value (`null` when unset)
    pub async fn fields_info(&self) -> Result<Vec<FieldInfo>> {
        let state = self.current_state().await?.state;
        Ok(self
            .executor
            .graph()
            .schema()
            .fields()
            .map(|spec| FieldInfo {
                name: spec.name.clone(),
                kind: spec.kind,
                policy: spec.policy,
                label: spec.label.clone(),
                value: state.get(&spec.name).cloned().unwrap_or(Value::Null),
                editable: spec.editable,
            })
            .collect())
    }

    /// Human-readable dump of every checkpoint, most recent first
    pub async fn snapshots_summary(&self, truncate: usize) -> Result<String> {
        let checkpoints = self.executor.get_history(&self.thread_id, None).await?;
        let mut out = String::new();

        for (index, checkpoint) in checkpoints.iter().enumerate() {
            let _ = writeln!(
                out,
                "[{}] {} (step {}, {}{})",
                index,
                checkpoint.id,
                checkpoint.metadata.step,
                checkpoint.metadata.source,
                checkpoint
                    .metadata
                    .writer
                    .as_deref()
                    .map(|w| format!(", by {}", w))
                    .unwrap_or_default()
            );
            let next = if checkpoint.next.is_empty() {
                "(end)".to_string()
            } else {
                checkpoint.next.join(", ")
            };
            let _ = writeln!(out, "    next: {}", next);
            for (key, value) in &checkpoint.state {
                let _ = writeln!(out, "    {}: {}", key, truncate_value(value, truncate));
            }
        }
        Ok(out)
    }
}

/// Render a value on one line, cut to `max` characters with `...`
pub fn truncate_value(value: &Value, max: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let text = text.replace('\n', " ");
    if text.chars().count() <= max {
        text
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_value() {
        assert_eq!(truncate_value(&json!("short"), 10), "short");
        assert_eq!(truncate_value(&json!("abcdefghij"), 4), "abcd...");
        assert_eq!(truncate_value(&json!("line\nbreak"), 80), "line break");
        assert_eq!(truncate_value(&json!([1, 2]), 80), "[1,2]");
    }
}
