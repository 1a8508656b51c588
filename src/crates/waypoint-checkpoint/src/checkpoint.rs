//! Checkpoint data structures
//!
//! A [`Checkpoint`] is an immutable snapshot of one thread: the full merged state,
//! the node(s) about to run, and metadata describing which write produced it.
//! Checkpoints of a thread are linked through `parent_id` and ordered by `seq`.
//!
//! ```text
//!  seq 0        seq 1          seq 2         seq 3
//! ┌──────┐    ┌────────┐    ┌────────┐    ┌────────┐
//! │ root │───▶│ input  │───▶│ loop:a │───▶│ loop:b │
//! └──────┘    └────────┘    └────┬───┘    └────────┘
//!                                │        seq 4
//!                                │      ┌────────┐
//!                                └─────▶│  fork  │   (rewind to seq 2)
//!                                       └────────┘
//! ```
//!
//! "Latest" is always the checkpoint with the highest `seq`, whichever branch it is on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier of a checkpoint within a thread.
pub type CheckpointId = String;

/// Thread state as persisted: field name to JSON value.
pub type StateValues = serde_json::Map<String, serde_json::Value>;

/// What kind of write produced a checkpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Thread creation or caller-supplied input
    Input,
    /// A node executed inside the run loop
    Loop,
    /// Manual state edit, approval edit or rejection marker
    Update,
    /// Copy of a historical checkpoint made current again (time travel)
    Fork,
}

impl CheckpointSource {
    /// Lowercase name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointSource::Input => "input",
            CheckpointSource::Loop => "loop",
            CheckpointSource::Update => "update",
            CheckpointSource::Fork => "fork",
        }
    }
}

impl std::fmt::Display for CheckpointSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to each checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMetadata {
    /// Kind of write that produced the checkpoint
    pub source: CheckpointSource,

    /// Step counter: -1 for the root, then increasing along the parent chain
    pub step: i64,

    /// Node that produced (or was credited with) the write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<String>,

    /// The partial update merged into the parent's state to obtain this state.
    /// `None` only for the root checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writes: Option<StateValues>,

    /// Free-form annotations (e.g. `updated_by`)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    /// Create metadata for a given source and step
    pub fn new(source: CheckpointSource, step: i64) -> Self {
        Self {
            source,
            step,
            writer: None,
            writes: None,
            extra: HashMap::new(),
        }
    }

    /// Metadata of a thread's root checkpoint
    pub fn root() -> Self {
        Self::new(CheckpointSource::Input, -1)
    }

    /// Set the node credited with the write
    pub fn with_writer(mut self, writer: impl Into<String>) -> Self {
        self.writer = Some(writer.into());
        self
    }

    /// Record the partial update applied by this checkpoint
    pub fn with_writes(mut self, writes: StateValues) -> Self {
        self.writes = Some(writes);
        self
    }

    /// Add an extra annotation
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// An immutable, persisted snapshot of a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Unique id (UUID v4)
    pub id: CheckpointId,

    /// Owning thread
    pub thread_id: String,

    /// Per-thread creation order; defines "latest" and history order
    pub seq: u64,

    /// Checkpoint this one was derived from (`None` for the root)
    pub parent_id: Option<CheckpointId>,

    /// Full merged state at this point
    pub state: StateValues,

    /// Nodes about to run; empty when the thread is terminal
    pub next: Vec<String>,

    /// How this checkpoint came to be
    pub metadata: CheckpointMetadata,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// True if no node is pending.
    pub fn is_terminal(&self) -> bool {
        self.next.is_empty()
    }

    /// The single node pending execution, if any.
    pub fn pending_node(&self) -> Option<&str> {
        self.next.first().map(String::as_str)
    }

    /// True for the thread's root checkpoint.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Everything the caller supplies when appending; the store assigns
/// `id`, `seq` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckpoint {
    pub parent_id: Option<CheckpointId>,
    pub state: StateValues,
    pub next: Vec<String>,
    pub metadata: CheckpointMetadata,
}

impl NewCheckpoint {
    pub fn new(
        parent_id: Option<CheckpointId>,
        state: StateValues,
        next: Vec<String>,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            parent_id,
            state,
            next,
            metadata,
        }
    }

    /// Materialize into a stored checkpoint.
    pub(crate) fn into_checkpoint(self, thread_id: &str, seq: u64) -> Checkpoint {
        Checkpoint {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.to_string(),
            seq,
            parent_id: self.parent_id,
            state: self.state,
            next: self.next,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_roundtrip_keeps_extra() {
        let mut writes = StateValues::new();
        writes.insert("count".to_string(), json!(1));

        let metadata = CheckpointMetadata::new(CheckpointSource::Update, 4)
            .with_writer("agent")
            .with_writes(writes.clone())
            .with_extra("updated_by", json!("manual"));

        let encoded = serde_json::to_value(&metadata).unwrap();
        assert_eq!(encoded["source"], json!("update"));
        assert_eq!(encoded["updated_by"], json!("manual"));

        let decoded: CheckpointMetadata = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, metadata);
        assert_eq!(decoded.writes, Some(writes));
    }

    #[test]
    fn test_pending_node_and_terminal() {
        let checkpoint = NewCheckpoint::new(
            None,
            StateValues::new(),
            vec!["planner".to_string()],
            CheckpointMetadata::root(),
        )
        .into_checkpoint("t-1", 0);

        assert!(checkpoint.is_root());
        assert!(!checkpoint.is_terminal());
        assert_eq!(checkpoint.pending_node(), Some("planner"));
        assert_eq!(checkpoint.metadata.step, -1);
    }
}
