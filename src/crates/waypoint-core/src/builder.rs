//! Graph builder
//!
//! [`GraphBuilder`] collects nodes, edges and the interrupt policy for a typed
//! state `S`, then [`compile`](GraphBuilder::compile)s them into an immutable
//! [`Graph`]. Step functions and selectors receive the decoded `S`; the
//! compiled graph works on the JSON form and merges through `S::schema()`.
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use waypoint_core::builder::GraphBuilder;
//! use waypoint_core::graph::END;
//! use waypoint_core::state::{FieldKind, FieldSpec, GraphState, StateSchema, StateUpdate};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Counter {
//!     #[serde(default)]
//!     count: i64,
//! }
//!
//! impl GraphState for Counter {
//!     fn schema() -> StateSchema {
//!         StateSchema::new().field(FieldSpec::new("count", FieldKind::Integer).accumulate())
//!     }
//! }
//!
//! let mut builder = GraphBuilder::<Counter>::new("counter");
//! builder
//!     .add_node("increment", |_state: Counter| async move {
//!         Ok(StateUpdate::new().set("count", 1))
//!     })
//!     .add_conditional_edge(
//!         "increment",
//!         |state: &Counter| if state.count >= 3 { END } else { "increment" },
//!         ["increment", END],
//!     )
//!     .set_entry("increment");
//!
//! let graph = builder.compile().unwrap();
//! assert_eq!(graph.entry(), "increment");
//! ```

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, NodeId, NodeSpec, RouterFn, StepFn, StepFuture};
use crate::interrupt::InterruptPolicy;
use crate::state::{GraphState, StateMap, StateSchema, StateUpdate};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Fluent builder for a [`Graph`] over typed state `S`
pub struct GraphBuilder<S: GraphState> {
    name: String,
    node_order: Vec<NodeId>,
    nodes: HashMap<NodeId, NodeSpec>,
    edges: HashMap<NodeId, Edge>,
    entry: Option<NodeId>,
    schema: StateSchema,
    interrupts: InterruptPolicy,
    on_reject: Option<crate::graph::RejectionFn>,
    on_approval_edit: Option<crate::graph::ApprovalEditFn>,
    errors: Vec<String>,
    _state: PhantomData<fn() -> S>,
}

impl<S: GraphState> GraphBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_order: Vec::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            schema: S::schema(),
            interrupts: InterruptPolicy::new(),
            on_reject: None,
            on_approval_edit: None,
            errors: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Replace the schema derived from `S`
    pub fn with_schema(&mut self, schema: StateSchema) -> &mut Self {
        self.schema = schema;
        self
    }

    /// Add a node whose step receives the decoded state
    pub fn add_node<F, Fut>(&mut self, name: impl Into<NodeId>, step: F) -> &mut Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateUpdate>> + Send + 'static,
    {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            self.errors.push(format!("Node '{}' is defined twice", name));
            return self;
        }
        if name == crate::graph::END {
            self.errors.push(format!("'{}' is reserved", name));
            return self;
        }

        let step = Arc::new(step);
        let step_fn: StepFn = Arc::new(move |values: StateMap| -> StepFuture {
            let step = Arc::clone(&step);
            Box::pin(async move {
                let state = S::from_values(&values)?;
                step(state).await
            })
        });

        self.node_order.push(name.clone());
        self.nodes.insert(
            name.clone(),
            NodeSpec {
                name,
                step: step_fn,
                description: None,
            },
        );
        self
    }

    /// Attach a human-readable description to an existing node
    pub fn describe_node(&mut self, name: &str, description: impl Into<String>) -> &mut Self {
        match self.nodes.get_mut(name) {
            Some(spec) => spec.description = Some(description.into()),
            None => self
                .errors
                .push(format!("Cannot describe unknown node '{}'", name)),
        }
        self
    }

    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        let from = from.into();
        self.set_edge(from, Edge::Direct(to.into()));
        self
    }

    /// Route from `from` by evaluating `selector` on the merged state.
    ///
    /// The selector must return one of `targets`; anything else fails the
    /// step with [`GraphError::InvalidRoute`].
    pub fn add_conditional_edge<F, T, I, N>(
        &mut self,
        from: impl Into<NodeId>,
        selector: F,
        targets: I,
    ) -> &mut Self
    where
        F: Fn(&S) -> T + Send + Sync + 'static,
        T: Into<NodeId>,
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let router: RouterFn = Arc::new(move |values: &StateMap| {
            let state = S::from_values(values)?;
            Ok(selector(&state).into())
        });
        let edge = Edge::Conditional {
            router,
            targets: targets.into_iter().map(Into::into).collect(),
        };
        self.set_edge(from.into(), edge);
        self
    }

    fn set_edge(&mut self, from: NodeId, edge: Edge) {
        if self.edges.contains_key(&from) {
            self.errors
                .push(format!("Node '{}' already has an outgoing edge", from));
            return;
        }
        self.edges.insert(from, edge);
    }

    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.entry = Some(node.into());
        self
    }

    /// Pause before each of `nodes` until the caller resumes
    pub fn interrupt_before<I, N>(&mut self, nodes: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.interrupts
            .interrupt_before
            .extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Update recorded when the pending node is rejected (e.g. a marker message)
    pub fn on_reject<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&S, &str) -> Option<StateUpdate> + Send + Sync + 'static,
    {
        self.on_reject = Some(Arc::new(move |values: &StateMap, node: &str| {
            let state = S::from_values(values)?;
            Ok(hook(&state, node))
        }));
        self
    }

    /// Update applied when the pending node is approved with modified arguments
    pub fn on_approval_edit<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&S, &str, &serde_json::Map<String, serde_json::Value>) -> Option<StateUpdate>
            + Send
            + Sync
            + 'static,
    {
        self.on_approval_edit = Some(Arc::new(
            move |values: &StateMap, node: &str, args: &serde_json::Map<String, serde_json::Value>| {
                let state = S::from_values(values)?;
                Ok(hook(&state, node, args))
            },
        ));
        self
    }

    /// Validate and freeze the graph
    pub fn compile(self) -> Result<Graph> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(GraphError::Validation(first));
        }

        let entry = self
            .entry
            .ok_or_else(|| GraphError::Validation("No entry point set".to_string()))?;

        let graph = Graph {
            name: self.name,
            node_order: self.node_order,
            nodes: self.nodes,
            edges: self.edges,
            entry,
            schema: self.schema,
            interrupts: self.interrupts,
            on_reject: self.on_reject,
            on_approval_edit: self.on_approval_edit,
        };
        graph.validate()?;

        tracing::debug!(graph = %graph.name, nodes = graph.node_order.len(), "Graph compiled");
        Ok(graph)
    }
}
