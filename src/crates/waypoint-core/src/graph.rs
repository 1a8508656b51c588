//! Immutable graph definition
//!
//! A [`Graph`] is produced once by [`crate::builder::GraphBuilder::compile`] and
//! never changes afterwards, so a single `Arc<Graph>` can drive any number of
//! threads concurrently. It owns:
//!
//! - the step function of every node,
//! - exactly one outgoing [`Edge`] per node (direct, or a conditional selector
//!   with its declared targets),
//! - the entry node and the [`END`] marker,
//! - the [`StateSchema`] used by every merge,
//! - the [`InterruptPolicy`] and the optional rejection / approval-edit hooks.

use crate::error::{GraphError, Result};
use crate::interrupt::InterruptPolicy;
use crate::state::{StateMap, StateSchema, StateUpdate};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Node identifier
pub type NodeId = String;

/// Terminal marker: routing here leaves `next` empty
pub const END: &str = "__end__";

/// Future returned by a step function
pub type StepFuture = Pin<Box<dyn Future<Output = Result<StateUpdate>> + Send>>;

/// A step function: full current state in, partial update out
pub type StepFn = Arc<dyn Fn(StateMap) -> StepFuture + Send + Sync>;

/// Conditional selector: picks the next node (or [`END`]) from the merged state
pub type RouterFn = Arc<dyn Fn(&StateMap) -> Result<NodeId> + Send + Sync>;

/// Builds the update recorded when a pending node is rejected
pub type RejectionFn = Arc<dyn Fn(&StateMap, &str) -> Result<Option<StateUpdate>> + Send + Sync>;

/// Turns approved-with-changes arguments into an update applied before the node runs
pub type ApprovalEditFn = Arc<
    dyn Fn(&StateMap, &str, &serde_json::Map<String, serde_json::Value>) -> Result<Option<StateUpdate>>
        + Send
        + Sync,
>;

/// Outgoing edge of a node
#[derive(Clone)]
pub enum Edge {
    Direct(NodeId),

    Conditional {
        router: RouterFn,
        targets: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { targets, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("targets", targets)
                .finish(),
        }
    }
}

impl Edge {
    /// Every node this edge can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional { targets, .. } => targets.iter().map(String::as_str).collect(),
        }
    }
}

/// A node: name, step function and an optional description
#[derive(Clone)]
pub struct NodeSpec {
    pub name: NodeId,
    pub step: StepFn,
    pub description: Option<String>,
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("step", &"<function>")
            .field("description", &self.description)
            .finish()
    }
}

/// Compiled, validated graph
#[derive(Clone)]
pub struct Graph {
    pub(crate) name: String,
    pub(crate) node_order: Vec<NodeId>,
    pub(crate) nodes: HashMap<NodeId, NodeSpec>,
    pub(crate) edges: HashMap<NodeId, Edge>,
    pub(crate) entry: NodeId,
    pub(crate) schema: StateSchema,
    pub(crate) interrupts: InterruptPolicy,
    pub(crate) on_reject: Option<RejectionFn>,
    pub(crate) on_approval_edit: Option<ApprovalEditFn>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.node_order)
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("interrupts", &self.interrupts)
            .finish()
    }
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn interrupts(&self) -> &InterruptPolicy {
        &self.interrupts
    }

    /// Node names in declaration order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(String::as_str)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node(&self, node: &str) -> Result<&NodeSpec> {
        self.nodes
            .get(node)
            .ok_or_else(|| GraphError::UnknownNode(node.to_string()))
    }

    pub(crate) fn rejection_hook(&self) -> Option<&RejectionFn> {
        self.on_reject.as_ref()
    }

    pub(crate) fn approval_edit_hook(&self) -> Option<&ApprovalEditFn> {
        self.on_approval_edit.as_ref()
    }

    /// Evaluate the outgoing edge of `from` against `state`.
    ///
    /// Returns the new `next`: empty when the edge leads to [`END`].
    pub fn route(&self, from: &str, state: &StateMap) -> Result<Vec<NodeId>> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| GraphError::Validation(format!("Node '{}' has no outgoing edge", from)))?;

        let target = match edge {
            Edge::Direct(to) => to.clone(),
            Edge::Conditional { router, targets } => {
                let target = router(state)?;
                if !targets.contains(&target) {
                    return Err(GraphError::InvalidRoute {
                        node: from.to_string(),
                        target,
                    });
                }
                target
            }
        };

        if target == END {
            Ok(Vec::new())
        } else {
            Ok(vec![target])
        }
    }

    /// Check the structural invariants of the graph
    pub fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.entry) {
            return Err(GraphError::Validation(format!(
                "Entry point '{}' does not exist",
                self.entry
            )));
        }

        for name in &self.node_order {
            let edge = self.edges.get(name).ok_or_else(|| {
                GraphError::Validation(format!(
                    "Node '{}' has no outgoing edge (wire it to END if it is terminal)",
                    name
                ))
            })?;

            if let Edge::Conditional { targets, .. } = edge {
                if targets.is_empty() {
                    return Err(GraphError::Validation(format!(
                        "Conditional edge from '{}' declares no targets",
                        name
                    )));
                }
            }

            for target in edge.targets() {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(GraphError::Validation(format!(
                        "Edge target '{}' (from '{}') does not exist",
                        target, name
                    )));
                }
            }
        }

        for from in self.edges.keys() {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::Validation(format!(
                    "Edge source '{}' does not exist",
                    from
                )));
            }
        }

        for node in &self.interrupts.interrupt_before {
            if !self.nodes.contains_key(node) {
                return Err(GraphError::Validation(format!(
                    "Interrupt node '{}' does not exist",
                    node
                )));
            }
        }

        Ok(())
    }

    /// Serializable description of the topology
    pub fn describe(&self) -> GraphInfo {
        let nodes = self
            .node_order
            .iter()
            .filter_map(|name| self.nodes.get(name))
            .map(|spec| NodeInfo {
                name: spec.name.clone(),
                description: spec.description.clone(),
                interrupt_before: self.interrupts.should_interrupt_before(&spec.name),
            })
            .collect();

        let edges = self
            .node_order
            .iter()
            .filter_map(|name| self.edges.get(name).map(|edge| (name, edge)))
            .map(|(from, edge)| EdgeInfo {
                from: from.clone(),
                to: edge.targets().into_iter().map(str::to_string).collect(),
                conditional: matches!(edge, Edge::Conditional { .. }),
            })
            .collect();

        GraphInfo {
            name: self.name.clone(),
            entry: self.entry.clone(),
            nodes,
            edges,
            interrupt_before: self.interrupts.interrupt_before.clone(),
        }
    }
}

/// Topology summary for display
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphInfo {
    pub name: String,
    pub entry: NodeId,
    pub nodes: Vec<NodeInfo>,
    pub edges: Vec<EdgeInfo>,
    pub interrupt_before: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NodeInfo {
    pub name: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub interrupt_before: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EdgeInfo {
    pub from: NodeId,
    pub to: Vec<NodeId>,
    pub conditional: bool,
}
