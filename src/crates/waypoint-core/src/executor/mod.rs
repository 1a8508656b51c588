//! Checkpointed graph executor
//!
//! The [`Executor`] drives threads of one [`Graph`] against a
//! [`CheckpointStore`]. Every transition is persisted before the next one
//! starts, so a thread can be paused, resumed, rewound or edited at any
//! checkpoint boundary:
//!
//! ```text
//!            run(input)
//!   NEW ──────────────────▶ RUNNING ──step──▶ RUNNING ──▶ ... ──▶ TERMINAL (next = [])
//!                              │  ▲
//!        next ∈ interrupts     │  │ resume(approve)
//!                              ▼  │
//!                     PAUSED_FOR_APPROVAL ──resume(reject)──▶ TERMINAL
//!
//!   step fails / times out ──▶ FAILED (no checkpoint written, retry with run)
//! ```
//!
//! # Checkpoint chain
//!
//! | Source   | Written by                           | `writes`              |
//! |----------|--------------------------------------|-----------------------|
//! | `input`  | thread creation, `run` with input    | input (or `{}`)       |
//! | `loop`   | one executed node                    | the node's update     |
//! | `update` | `update_state`, approval edit, reject | the applied partial   |
//! | `fork`   | `resume_from`                        | new input (or `{}`)   |
//!
//! The root checkpoint holds the schema defaults. Folding every `writes` on
//! the parent chain through the schema reproduces the state of any
//! checkpoint; [`Executor::replay`] does exactly that.
//!
//! # Concurrency
//!
//! Operations on one thread are serialized by a per-thread async mutex.
//! Distinct threads share nothing but the store.

mod locks;
mod types;

pub use types::{
    ExecutionEvent, ExecutorConfig, RunOutcome, RunStatus, ThreadSnapshot, DEFAULT_MAX_STEPS,
};

use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeId};
use crate::interrupt::ResumeDecision;
use crate::state::{StateMap, StateUpdate};
use locks::ThreadLocks;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waypoint_checkpoint::{
    Checkpoint, CheckpointMetadata, CheckpointSource, CheckpointStore, NewCheckpoint,
};

type EventSink<'a> = Option<&'a mpsc::Sender<ExecutionEvent>>;

async fn emit(events: EventSink<'_>, event: ExecutionEvent) {
    if let Some(sender) = events {
        // A dropped receiver only means nobody is listening.
        let _ = sender.send(event).await;
    }
}

/// Drives threads of one graph over a checkpoint store
pub struct Executor {
    graph: Arc<Graph>,
    store: Arc<dyn CheckpointStore>,
    config: ExecutorConfig,
    locks: ThreadLocks,
    failures: Mutex<HashMap<String, String>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("graph", &self.graph.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    pub fn new(graph: Arc<Graph>, store: Arc<dyn CheckpointStore>) -> Self {
        Self::with_config(graph, store, ExecutorConfig::default())
    }

    pub fn with_config(
        graph: Arc<Graph>,
        store: Arc<dyn CheckpointStore>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            graph,
            store,
            config,
            locks: ThreadLocks::new(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Start or continue a thread.
    ///
    /// A new thread gets a root checkpoint and an `input` checkpoint pointing
    /// at the entry node. On an existing thread, `input` is merged first; if
    /// the thread had finished it is pointed back at the entry node. Without
    /// input a finished thread is returned untouched.
    #[tracing::instrument(skip(self, input), fields(graph = %self.graph.name()))]
    pub async fn run(&self, thread_id: &str, input: Option<StateUpdate>) -> Result<RunOutcome> {
        self.run_inner(thread_id, input, None).await
    }

    /// [`Executor::run`], reporting progress on `events`
    #[tracing::instrument(skip(self, input, events), fields(graph = %self.graph.name()))]
    pub async fn run_with_events(
        &self,
        thread_id: &str,
        input: Option<StateUpdate>,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<RunOutcome> {
        self.run_inner(thread_id, input, Some(&events)).await
    }

    async fn run_inner(
        &self,
        thread_id: &str,
        input: Option<StateUpdate>,
        events: EventSink<'_>,
    ) -> Result<RunOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        let head = match self.store.latest(thread_id).await? {
            None => self.start_thread(thread_id, input).await?,
            Some(head) => match input {
                Some(input) => self.apply_input(thread_id, &head, input).await?,
                None => head,
            },
        };

        self.drive(thread_id, head, None, events).await
    }

    async fn start_thread(&self, thread_id: &str, input: Option<StateUpdate>) -> Result<Checkpoint> {
        info!(thread_id, "Starting new thread");
        let root = self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(
                    None,
                    self.graph.schema().defaults(),
                    Vec::new(),
                    CheckpointMetadata::root(),
                ),
            )
            .await?;

        let writes = input.map(StateUpdate::into_map).unwrap_or_default();
        let state = self.graph.schema().merge(&root.state, &writes)?;
        let metadata = CheckpointMetadata::new(CheckpointSource::Input, 0).with_writes(writes);

        Ok(self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(
                    Some(root.id),
                    state,
                    vec![self.graph.entry().to_string()],
                    metadata,
                ),
            )
            .await?)
    }

    async fn apply_input(
        &self,
        thread_id: &str,
        head: &Checkpoint,
        input: StateUpdate,
    ) -> Result<Checkpoint> {
        let writes = input.into_map();
        let state = self.graph.schema().merge(&head.state, &writes)?;
        let next = if head.is_terminal() {
            vec![self.graph.entry().to_string()]
        } else {
            head.next.clone()
        };
        debug!(thread_id, ?next, "Merging input into existing thread");

        let metadata =
            CheckpointMetadata::new(CheckpointSource::Input, head.metadata.step + 1).with_writes(writes);
        Ok(self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(Some(head.id.clone()), state, next, metadata),
            )
            .await?)
    }

    /// Answer a thread paused before a node.
    ///
    /// Rejecting records the graph's rejection marker (if any) and finishes
    /// the thread without running the node. Approving runs the node, after
    /// applying `modified_args` through the graph's approval editor.
    #[tracing::instrument(skip(self, decision), fields(graph = %self.graph.name(), approved = decision.approved))]
    pub async fn resume(&self, thread_id: &str, decision: ResumeDecision) -> Result<RunOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        let head = self.require_head(thread_id).await?;
        let node = match head.pending_node() {
            Some(node) if self.graph.interrupts().should_interrupt_before(node) => node.to_string(),
            _ => return Err(GraphError::NoPendingAction(thread_id.to_string())),
        };

        if !decision.approved {
            return self.reject(thread_id, &head, &node).await;
        }

        let mut head = head;
        if let (Some(args), Some(editor)) = (&decision.modified_args, self.graph.approval_edit_hook()) {
            if let Some(update) = editor(&head.state, &node, args)? {
                info!(thread_id, node = %node, "Applying edited arguments before resuming");
                let writes = update.into_map();
                let state = self.graph.schema().merge(&head.state, &writes)?;
                let metadata = CheckpointMetadata::new(CheckpointSource::Update, head.metadata.step + 1)
                    .with_writes(writes)
                    .with_extra("updated_by", serde_json::json!("approval"));
                head = self
                    .store
                    .append(
                        thread_id,
                        NewCheckpoint::new(Some(head.id.clone()), state, head.next.clone(), metadata),
                    )
                    .await?;
            }
        }

        self.drive(thread_id, head, Some(node), None).await
    }

    async fn reject(&self, thread_id: &str, head: &Checkpoint, node: &str) -> Result<RunOutcome> {
        info!(thread_id, node, "Pending node rejected");

        let writes = match self.graph.rejection_hook() {
            Some(hook) => hook(&head.state, node)?.map(StateUpdate::into_map),
            None => None,
        }
        .unwrap_or_default();

        let state = self.graph.schema().merge(&head.state, &writes)?;
        let metadata = CheckpointMetadata::new(CheckpointSource::Update, head.metadata.step + 1)
            .with_writes(writes)
            .with_extra("rejected", serde_json::json!(node));
        let checkpoint = self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(Some(head.id.clone()), state, Vec::new(), metadata),
            )
            .await?;

        self.clear_failure(thread_id);
        Ok(RunOutcome::at(&checkpoint, RunStatus::Completed, 0, None))
    }

    /// Branch from a historical checkpoint and continue from there.
    ///
    /// The new `fork` checkpoint copies the target's state (merged with
    /// `new_input`, if given) and its `next`; later checkpoints stay in the
    /// history but are no longer on the latest branch. Interrupts still apply.
    #[tracing::instrument(skip(self, new_input), fields(graph = %self.graph.name()))]
    pub async fn resume_from(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        new_input: Option<StateUpdate>,
    ) -> Result<RunOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        let target = self.store.get(thread_id, checkpoint_id).await?;
        let latest = self.require_head(thread_id).await?;

        let has_input = new_input.is_some();
        let writes = new_input.map(StateUpdate::into_map).unwrap_or_default();
        let state = self.graph.schema().merge(&target.state, &writes)?;
        let next = if target.is_terminal() && has_input {
            vec![self.graph.entry().to_string()]
        } else {
            target.next.clone()
        };

        info!(thread_id, checkpoint_id, seq = target.seq, "Rewinding thread");
        let metadata = CheckpointMetadata::new(CheckpointSource::Fork, latest.metadata.step + 1)
            .with_writes(writes)
            .with_extra("forked_from", serde_json::json!(target.id));
        let fork = self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(Some(target.id.clone()), state, next, metadata),
            )
            .await?;

        self.clear_failure(thread_id);
        self.drive(thread_id, fork, None, None).await
    }

    /// Merge an external edit into the latest state without running a node.
    ///
    /// With `as_node`, `next` is recomputed as if that node had just
    /// produced the edit; otherwise `next` is kept.
    #[tracing::instrument(skip(self, update), fields(graph = %self.graph.name()))]
    pub async fn update_state(
        &self,
        thread_id: &str,
        update: StateUpdate,
        as_node: Option<&str>,
    ) -> Result<ThreadSnapshot> {
        let _guard = self.locks.acquire(thread_id).await;

        let head = self.require_head(thread_id).await?;
        let writes = update.into_map();
        let state = self.graph.schema().merge(&head.state, &writes)?;

        let next = match as_node {
            Some(node) => {
                self.graph.node(node)?;
                self.graph.route(node, &state)?
            }
            None => head.next.clone(),
        };

        let mut metadata = CheckpointMetadata::new(CheckpointSource::Update, head.metadata.step + 1)
            .with_writes(writes)
            .with_extra("updated_by", serde_json::json!("manual"));
        if let Some(node) = as_node {
            metadata = metadata.with_writer(node);
        }

        let checkpoint = self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(Some(head.id.clone()), state, next, metadata),
            )
            .await?;
        info!(thread_id, checkpoint_id = %checkpoint.id, "State updated manually");

        self.clear_failure(thread_id);
        Ok(self.snapshot(checkpoint))
    }

    /// Latest state of a thread
    pub async fn get_state(&self, thread_id: &str) -> Result<ThreadSnapshot> {
        let head = self.require_head(thread_id).await?;
        Ok(self.snapshot(head))
    }

    /// Checkpoints of a thread, most recent first
    pub async fn get_history(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Checkpoint>> {
        let mut history = self.store.history(thread_id).await?;
        if let Some(limit) = limit {
            history.truncate(limit);
        }
        Ok(history)
    }

    /// One historical checkpoint, unchanged
    pub async fn get_checkpoint(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint> {
        Ok(self.store.get(thread_id, checkpoint_id).await?)
    }

    /// Recompute the state of `checkpoint_id` by folding every recorded
    /// write on its parent chain onto the root state.
    pub async fn replay(&self, thread_id: &str, checkpoint_id: &str) -> Result<StateMap> {
        let history = self.store.history(thread_id).await?;
        let by_id: HashMap<&str, &Checkpoint> =
            history.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut chain = Vec::new();
        let mut cursor = Some(checkpoint_id);
        while let Some(id) = cursor {
            let checkpoint = by_id.get(id).copied().ok_or_else(|| GraphError::CheckpointNotFound {
                thread_id: thread_id.to_string(),
                checkpoint_id: id.to_string(),
            })?;
            chain.push(checkpoint);
            cursor = checkpoint.parent_id.as_deref();
        }

        let mut chain = chain.into_iter().rev();
        let mut state = chain.next().map(|root| root.state.clone()).unwrap_or_default();
        for checkpoint in chain {
            if let Some(writes) = &checkpoint.metadata.writes {
                state = self.graph.schema().merge(&state, writes)?;
            }
        }
        Ok(state)
    }

    /// Ids of every thread in the store
    pub async fn list_threads(&self) -> Result<Vec<String>> {
        Ok(self.store.list_threads().await?)
    }

    async fn require_head(&self, thread_id: &str) -> Result<Checkpoint> {
        self.store
            .latest(thread_id)
            .await?
            .ok_or_else(|| GraphError::ThreadNotFound(thread_id.to_string()))
    }

    fn status_of(&self, head: &Checkpoint) -> (RunStatus, Option<String>) {
        match head.pending_node() {
            None => (RunStatus::Completed, None),
            Some(node) if self.graph.interrupts().should_interrupt_before(node) => {
                (RunStatus::Interrupted, None)
            }
            Some(_) => match self.failures.lock().get(&head.thread_id) {
                Some(message) => (RunStatus::Error, Some(message.clone())),
                None => (RunStatus::Running, None),
            },
        }
    }

    fn snapshot(&self, head: Checkpoint) -> ThreadSnapshot {
        let (status, error) = self.status_of(&head);
        ThreadSnapshot {
            thread_id: head.thread_id,
            checkpoint_id: head.id,
            parent_id: head.parent_id,
            state: head.state,
            next: head.next,
            status,
            metadata: head.metadata,
            created_at: head.created_at,
            error,
        }
    }

    fn record_failure(&self, thread_id: &str, message: String) {
        self.failures.lock().insert(thread_id.to_string(), message);
    }

    fn clear_failure(&self, thread_id: &str) {
        self.failures.lock().remove(thread_id);
    }

    /// Execute pending nodes until the thread finishes, pauses or fails.
    ///
    /// `approved` skips the interrupt check for the first pending node only.
    async fn drive(
        &self,
        thread_id: &str,
        mut head: Checkpoint,
        mut approved: Option<NodeId>,
        events: EventSink<'_>,
    ) -> Result<RunOutcome> {
        let mut steps = 0;

        loop {
            let node = match head.pending_node() {
                Some(node) => node.to_string(),
                None => {
                    info!(thread_id, steps, "Thread completed");
                    self.clear_failure(thread_id);
                    emit(events, ExecutionEvent::Completed).await;
                    return Ok(RunOutcome::at(&head, RunStatus::Completed, steps, None));
                }
            };

            let bypass = approved.take().is_some_and(|n| n == node);
            if !bypass && self.graph.interrupts().should_interrupt_before(&node) {
                info!(thread_id, node = %node, "Paused for approval");
                emit(events, ExecutionEvent::Interrupted { node }).await;
                return Ok(RunOutcome::at(&head, RunStatus::Interrupted, steps, None));
            }

            if steps >= self.config.max_steps {
                warn!(thread_id, limit = self.config.max_steps, "Recursion limit reached");
                return Err(GraphError::RecursionLimit {
                    thread_id: thread_id.to_string(),
                    limit: self.config.max_steps,
                });
            }

            emit(events, ExecutionEvent::NodeStarted { node: node.clone() }).await;
            match self.execute_step(thread_id, &head, &node).await {
                Ok((checkpoint, update)) => {
                    steps += 1;
                    self.clear_failure(thread_id);
                    emit(
                        events,
                        ExecutionEvent::NodeCompleted {
                            node,
                            checkpoint_id: checkpoint.id.clone(),
                            update,
                        },
                    )
                    .await;
                    head = checkpoint;
                }
                Err(GraphError::StepExecution { node, message }) => {
                    warn!(thread_id, node = %node, error = %message, "Step failed");
                    self.record_failure(thread_id, message.clone());
                    emit(
                        events,
                        ExecutionEvent::Failed {
                            node: node.clone(),
                            message: message.clone(),
                        },
                    )
                    .await;
                    let error = format!("Step '{}' failed: {}", node, message);
                    return Ok(RunOutcome::at(&head, RunStatus::Error, steps, Some(error)));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run one node against `head` and persist the result.
    ///
    /// Nothing is written unless the step, the merge and the routing all succeed.
    async fn execute_step(
        &self,
        thread_id: &str,
        head: &Checkpoint,
        node: &str,
    ) -> Result<(Checkpoint, StateUpdate)> {
        let spec = self.graph.node(node)?;
        debug!(thread_id, node, step = head.metadata.step + 1, "Executing node");

        let future = (spec.step)(head.state.clone());
        let outcome = match self.config.step_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| GraphError::step(node, format!("timed out after {:?}", limit)))?,
            None => future.await,
        };
        let update = outcome.map_err(|err| match err {
            GraphError::StepExecution { message, .. } => GraphError::step(node, message),
            other => GraphError::step(node, other.to_string()),
        })?;

        let state = self
            .graph
            .schema()
            .merge(&head.state, update.as_map())
            .map_err(|err| GraphError::step(node, err.to_string()))?;
        let next = self.graph.route(node, &state)?;

        let metadata = CheckpointMetadata::new(CheckpointSource::Loop, head.metadata.step + 1)
            .with_writer(node)
            .with_writes(update.as_map().clone());
        let checkpoint = self
            .store
            .append(
                thread_id,
                NewCheckpoint::new(Some(head.id.clone()), state, next, metadata),
            )
            .await?;

        debug!(thread_id, node, checkpoint_id = %checkpoint.id, next = ?checkpoint.next, "Node completed");
        Ok((checkpoint, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::graph::END;
    use crate::state::{FieldKind, FieldSpec, StateSchema};
    use serde_json::json;
    use waypoint_checkpoint::InMemoryCheckpointStore;

    fn counter_graph(interrupt: bool) -> Arc<Graph> {
        let mut builder = GraphBuilder::<StateMap>::new("counter");
        builder
            .with_schema(
                StateSchema::new().field(
                    FieldSpec::new("count", FieldKind::Integer)
                        .accumulate()
                        .default_value(json!(0)),
                ),
            )
            .add_node("inc", |_state: StateMap| async {
                Ok(StateUpdate::new().set("count", 1))
            })
            .add_conditional_edge(
                "inc",
                |state: &StateMap| {
                    if state["count"].as_i64().unwrap_or(0) >= 3 {
                        END
                    } else {
                        "inc"
                    }
                },
                ["inc", END],
            )
            .set_entry("inc");
        if interrupt {
            builder.interrupt_before(["inc"]);
        }
        Arc::new(builder.compile().unwrap())
    }

    fn executor(graph: Arc<Graph>) -> Executor {
        Executor::new(graph, Arc::new(InMemoryCheckpointStore::new()))
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let executor = executor(counter_graph(false));
        let outcome = executor.run("t", None).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.state["count"], json!(3));
        assert_eq!(outcome.steps, 3);
        // root + input + three loop checkpoints
        assert_eq!(executor.get_history("t", None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_interrupt_and_approve() {
        let executor = executor(counter_graph(true));
        let outcome = executor.run("t", None).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Interrupted);
        assert_eq!(outcome.pending_node(), Some("inc"));
        assert_eq!(outcome.steps, 0);

        let outcome = executor.resume("t", ResumeDecision::approve()).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Interrupted);
        assert_eq!(outcome.state["count"], json!(1));
        assert_eq!(outcome.steps, 1);
    }

    #[tokio::test]
    async fn test_resume_without_pause_fails() {
        let executor = executor(counter_graph(false));
        assert!(matches!(
            executor.resume("t", ResumeDecision::approve()).await,
            Err(GraphError::ThreadNotFound(_))
        ));

        executor.run("t", None).await.unwrap();
        assert!(matches!(
            executor.resume("t", ResumeDecision::approve()).await,
            Err(GraphError::NoPendingAction(_))
        ));
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let graph = counter_graph(false);
        let executor = Executor::with_config(
            graph,
            Arc::new(InMemoryCheckpointStore::new()),
            ExecutorConfig::default().with_max_steps(2),
        );
        let err = executor.run("t", None).await.unwrap_err();
        assert!(matches!(err, GraphError::RecursionLimit { limit: 2, .. }));

        let snapshot = executor.get_state("t").await.unwrap();
        assert_eq!(snapshot.state["count"], json!(2));
        assert_eq!(snapshot.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_get_state_unknown_thread() {
        let executor = executor(counter_graph(false));
        assert!(matches!(
            executor.get_state("missing").await,
            Err(GraphError::ThreadNotFound(_))
        ));
    }
}
