//! Human-in-the-loop interrupt policy and resume decisions
//!
//! A graph pauses *before* every node listed in its [`InterruptPolicy`]. Pausing
//! writes nothing and schedules nothing: the thread simply stays at its latest
//! checkpoint, whose `next` names the node awaiting approval, until a caller
//! submits a [`ResumeDecision`].

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};

/// Nodes that require approval before they run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptPolicy {
    pub interrupt_before: Vec<NodeId>,
}

impl InterruptPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        Self {
            interrupt_before: nodes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn should_interrupt_before(&self, node: &str) -> bool {
        self.interrupt_before.iter().any(|n| n == node)
    }

    pub fn is_empty(&self) -> bool {
        self.interrupt_before.is_empty()
    }
}

/// Caller's answer to a paused thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeDecision {
    pub approved: bool,

    /// Replacement tool arguments, merged over the pending call's arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_args: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ResumeDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            modified_args: None,
        }
    }

    pub fn reject() -> Self {
        Self::default()
    }

    pub fn approve_with_args(args: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            approved: true,
            modified_args: Some(args),
        }
    }
}
