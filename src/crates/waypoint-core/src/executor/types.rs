//! Executor configuration, outcomes and events

use crate::graph::NodeId;
use crate::state::{StateMap, StateUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use waypoint_checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata};

/// Default bound on steps executed by a single call
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Executor limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Upper bound on one step function invocation; `None` waits forever
    pub step_timeout: Option<Duration>,

    /// Upper bound on steps executed by one `run` / `resume` / `resume_from` call
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ExecutorConfig {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Where a thread stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// A node is pending and nothing is blocking it
    Running,
    /// Paused before a node that needs approval
    Interrupted,
    /// `next` is empty
    Completed,
    /// The last step failed; retryable at the same node
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a driving call (`run`, `resume`, `resume_from`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub thread_id: String,
    pub status: RunStatus,
    pub state: StateMap,
    pub next: Vec<NodeId>,
    /// Latest checkpoint after the call
    pub checkpoint_id: CheckpointId,
    /// Steps executed by this call
    pub steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    pub(crate) fn at(
        head: &Checkpoint,
        status: RunStatus,
        steps: usize,
        error: Option<String>,
    ) -> Self {
        Self {
            thread_id: head.thread_id.clone(),
            status,
            state: head.state.clone(),
            next: head.next.clone(),
            checkpoint_id: head.id.clone(),
            steps,
            error,
        }
    }

    /// The node awaiting approval, when interrupted
    pub fn pending_node(&self) -> Option<&str> {
        match self.status {
            RunStatus::Interrupted => self.next.first().map(String::as_str),
            _ => None,
        }
    }
}

/// Current view of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub thread_id: String,
    pub checkpoint_id: CheckpointId,
    pub parent_id: Option<CheckpointId>,
    pub state: StateMap,
    pub next: Vec<NodeId>,
    pub status: RunStatus,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress notifications emitted by `run_with_events`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    NodeStarted {
        node: NodeId,
    },
    NodeCompleted {
        node: NodeId,
        checkpoint_id: CheckpointId,
        update: StateUpdate,
    },
    Interrupted {
        node: NodeId,
    },
    Completed,
    Failed {
        node: NodeId,
        message: String,
    },
}
