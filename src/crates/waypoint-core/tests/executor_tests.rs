//! Executor behavior: replay, idempotence, revision bound, rewind, interrupts, failures

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use waypoint_checkpoint::{CheckpointSource, InMemoryCheckpointStore, SqliteCheckpointStore};
use waypoint_core::{
    ExecutionEvent, Executor, ExecutorConfig, FieldKind, FieldSpec, Graph, GraphBuilder,
    GraphError, GraphState, Message, ResumeDecision, RunStatus, StateManager, StateMap,
    StateSchema, StateUpdate, END,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Draft {
    #[serde(default)]
    revision_number: i64,
    #[serde(default)]
    max_revisions: i64,
    #[serde(default)]
    drafts: Vec<String>,
    #[serde(default)]
    count: i64,
}

impl GraphState for Draft {
    fn schema() -> StateSchema {
        StateSchema::new()
            .field(
                FieldSpec::new("revision_number", FieldKind::Integer)
                    .label("Revision")
                    .default_value(json!(0)),
            )
            .field(FieldSpec::new("max_revisions", FieldKind::Integer).default_value(json!(2)))
            .field(FieldSpec::new("drafts", FieldKind::TextList).accumulate())
            .field(
                FieldSpec::new("count", FieldKind::Integer)
                    .accumulate()
                    .read_only(),
            )
    }
}

/// generate -> (END | reflect) -> generate ...
fn revision_graph(generations: Arc<AtomicUsize>, interrupts: &[&str]) -> Arc<Graph> {
    let mut builder = GraphBuilder::<Draft>::new("revisions");
    builder
        .add_node("generate", move |state: Draft| {
            let generations = Arc::clone(&generations);
            async move {
                if state.revision_number >= state.max_revisions {
                    return Err(GraphError::step("generate", "revision budget spent"));
                }
                generations.fetch_add(1, Ordering::SeqCst);
                let revision = state.revision_number + 1;
                Ok(StateUpdate::new()
                    .set("revision_number", revision)
                    .set("drafts", json!([format!("draft {}", revision)]))
                    .set("count", 1))
            }
        })
        .add_node("reflect", |_state: Draft| async {
            Ok(StateUpdate::new().set("count", 1))
        })
        .add_conditional_edge(
            "generate",
            |state: &Draft| {
                if state.revision_number >= state.max_revisions {
                    END
                } else {
                    "reflect"
                }
            },
            ["reflect", END],
        )
        .add_edge("reflect", "generate")
        .set_entry("generate")
        .interrupt_before(interrupts.iter().copied());
    Arc::new(builder.compile().unwrap())
}

fn memory_executor(graph: Arc<Graph>) -> Executor {
    Executor::new(graph, Arc::new(InMemoryCheckpointStore::new()))
}

fn input(max_revisions: i64) -> Option<StateUpdate> {
    Some(StateUpdate::new().set("max_revisions", max_revisions))
}

#[tokio::test]
async fn test_revision_bound() {
    for max_revisions in 1..=4 {
        let generations = Arc::new(AtomicUsize::new(0));
        let executor = memory_executor(revision_graph(Arc::clone(&generations), &[]));

        let outcome = executor.run("t", input(max_revisions)).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.state["revision_number"], json!(max_revisions));
        assert_eq!(generations.load(Ordering::SeqCst), max_revisions as usize);
        assert_eq!(
            outcome.state["drafts"].as_array().map(Vec::len),
            Some(max_revisions as usize)
        );
    }

    for max_revisions in [0, -1, -5] {
        let generations = Arc::new(AtomicUsize::new(0));
        let executor = memory_executor(revision_graph(Arc::clone(&generations), &[]));

        let outcome = executor.run("t", input(max_revisions)).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.state["revision_number"], json!(0));
        assert_eq!(outcome.next, vec!["generate"]);
        assert_eq!(generations.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_replay_reproduces_every_checkpoint() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    executor.run("t", input(3)).await.unwrap();
    executor
        .update_state("t", StateUpdate::new().set("drafts", json!(["note"])), None)
        .await
        .unwrap();

    for checkpoint in executor.get_history("t", None).await.unwrap() {
        let replayed = executor.replay("t", &checkpoint.id).await.unwrap();
        assert_eq!(replayed, checkpoint.state, "checkpoint seq {}", checkpoint.seq);
    }
}

#[tokio::test]
async fn test_terminal_run_is_idempotent() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    let first = executor.run("t", input(2)).await.unwrap();
    let before = executor.get_history("t", None).await.unwrap().len();

    let second = executor.run("t", None).await.unwrap();
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.state, first.state);
    assert_eq!(second.checkpoint_id, first.checkpoint_id);
    assert_eq!(second.steps, 0);
    assert_eq!(executor.get_history("t", None).await.unwrap().len(), before);
}

#[tokio::test]
async fn test_checkpoint_chain_shape() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    executor.run("t", input(1)).await.unwrap();

    let history = executor.get_history("t", None).await.unwrap();
    let seqs: Vec<u64> = history.iter().map(|c| c.seq).collect();
    assert_eq!(seqs, vec![2, 1, 0]);

    let root = &history[2];
    assert!(root.is_root());
    assert_eq!(root.metadata.step, -1);
    assert_eq!(root.state["max_revisions"], json!(2));

    let input_checkpoint = &history[1];
    assert_eq!(input_checkpoint.metadata.source, CheckpointSource::Input);
    assert_eq!(input_checkpoint.next, vec!["generate"]);

    let step = &history[0];
    assert_eq!(step.metadata.source, CheckpointSource::Loop);
    assert_eq!(step.metadata.writer.as_deref(), Some("generate"));
    assert!(step.next.is_empty());

    let limited = executor.get_history("t", Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_rewind_creates_branch() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    executor.run("t", input(2)).await.unwrap();

    // root, input, generate, reflect, generate
    let original: Vec<_> = executor
        .get_history("t", None)
        .await
        .unwrap()
        .into_iter()
        .rev()
        .collect();
    assert_eq!(original.len(), 5);
    let after_first_generate = &original[2];
    assert_eq!(after_first_generate.next, vec!["reflect"]);

    let outcome = executor
        .resume_from("t", &after_first_generate.id, None)
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.state["revision_number"], json!(2));

    let history = executor.get_history("t", None).await.unwrap();
    assert_eq!(history.len(), 8);
    assert_eq!(history[0].id, outcome.checkpoint_id);

    let fork = history
        .iter()
        .find(|c| c.metadata.source == CheckpointSource::Fork)
        .unwrap();
    assert_eq!(fork.parent_id.as_deref(), Some(after_first_generate.id.as_str()));
    assert_eq!(fork.state, after_first_generate.state);

    for abandoned in &original[3..] {
        let loaded = executor.get_checkpoint("t", &abandoned.id).await.unwrap();
        assert_eq!(loaded.state, abandoned.state);
    }
}

#[tokio::test]
async fn test_rewind_with_new_input() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    let done = executor.run("t", input(1)).await.unwrap();

    let outcome = executor
        .resume_from("t", &done.checkpoint_id, input(3))
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.state["max_revisions"], json!(3));
    assert_eq!(outcome.state["revision_number"], json!(3));
}

#[tokio::test]
async fn test_rewind_unknown_checkpoint() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    executor.run("t", input(1)).await.unwrap();

    let err = executor.resume_from("t", "missing", None).await.unwrap_err();
    assert!(matches!(err, GraphError::CheckpointNotFound { .. }));
}

#[tokio::test]
async fn test_interrupt_pauses_once_per_pass() {
    let generations = Arc::new(AtomicUsize::new(0));
    let executor = memory_executor(revision_graph(Arc::clone(&generations), &["generate"]));

    let outcome = executor.run("t", input(2)).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Interrupted);
    assert_eq!(outcome.next, vec!["generate"]);
    assert_eq!(generations.load(Ordering::SeqCst), 0);

    // Re-running does not bypass the pause
    let again = executor.run("t", None).await.unwrap();
    assert_eq!(again.status, RunStatus::Interrupted);
    assert_eq!(again.checkpoint_id, outcome.checkpoint_id);
    assert_eq!(generations.load(Ordering::SeqCst), 0);

    let outcome = executor.resume("t", ResumeDecision::approve()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Interrupted);
    assert_eq!(generations.load(Ordering::SeqCst), 1);

    let outcome = executor.resume("t", ResumeDecision::approve()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(generations.load(Ordering::SeqCst), 2);

    let snapshot = executor.get_state("t").await.unwrap();
    assert_eq!(snapshot.status, RunStatus::Completed);
}

fn chat_graph(tool_runs: Arc<AtomicUsize>) -> Arc<Graph> {
    let mut builder = GraphBuilder::<StateMap>::new("chat");
    builder
        .with_schema(
            StateSchema::new().field(FieldSpec::new("messages", FieldKind::Messages).accumulate()),
        )
        .add_node("tools", move |_state: StateMap| {
            let tool_runs = Arc::clone(&tool_runs);
            async move {
                tool_runs.fetch_add(1, Ordering::SeqCst);
                StateUpdate::new().try_set("messages", &vec![Message::tool("ok", "c1", "echo")])
                    .map_err(GraphError::from)
            }
        })
        .add_edge("tools", END)
        .set_entry("tools")
        .interrupt_before(["tools"])
        .on_reject(|_state: &StateMap, _node: &str| {
            StateUpdate::new()
                .try_set(
                    "messages",
                    &vec![Message::human("[Tool execution rejected by user]")],
                )
                .ok()
        });
    Arc::new(builder.compile().unwrap())
}

#[tokio::test]
async fn test_reject_never_runs_node() {
    let tool_runs = Arc::new(AtomicUsize::new(0));
    let executor = memory_executor(chat_graph(Arc::clone(&tool_runs)));

    let paused = executor.run("t", None).await.unwrap();
    assert_eq!(paused.status, RunStatus::Interrupted);

    let outcome = executor.resume("t", ResumeDecision::reject()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.next.is_empty());
    assert_eq!(tool_runs.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome.state["messages"],
        json!([{"type": "human", "content": "[Tool execution rejected by user]"}])
    );

    let latest = executor.get_state("t").await.unwrap();
    assert_eq!(latest.metadata.source, CheckpointSource::Update);
    assert_eq!(latest.metadata.extra["rejected"], json!("tools"));

    assert!(matches!(
        executor.resume("t", ResumeDecision::reject()).await,
        Err(GraphError::NoPendingAction(_))
    ));
}

fn flaky_graph(failures_left: Arc<AtomicUsize>, delay: Option<Duration>) -> Arc<Graph> {
    let mut builder = GraphBuilder::<StateMap>::new("flaky");
    builder
        .add_node("call_model", move |_state: StateMap| {
            let failures_left = Arc::clone(&failures_left);
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if failures_left.load(Ordering::SeqCst) > 0 {
                    failures_left.fetch_sub(1, Ordering::SeqCst);
                    return Err(GraphError::step("call_model", "model unavailable"));
                }
                Ok(StateUpdate::new().set("answer", "42"))
            }
        })
        .add_edge("call_model", END)
        .set_entry("call_model");
    Arc::new(builder.compile().unwrap())
}

#[tokio::test]
async fn test_step_failure_writes_nothing_and_is_retryable() {
    let executor = memory_executor(flaky_graph(Arc::new(AtomicUsize::new(1)), None));

    let failed = executor.run("t", None).await.unwrap();
    assert_eq!(failed.status, RunStatus::Error);
    assert_eq!(failed.next, vec!["call_model"]);
    assert!(failed.error.as_deref().unwrap().contains("model unavailable"));
    assert_eq!(executor.get_history("t", None).await.unwrap().len(), 2);

    let snapshot = executor.get_state("t").await.unwrap();
    assert_eq!(snapshot.status, RunStatus::Error);
    assert_eq!(snapshot.checkpoint_id, failed.checkpoint_id);

    let retried = executor.run("t", None).await.unwrap();
    assert_eq!(retried.status, RunStatus::Completed);
    assert_eq!(retried.state["answer"], json!("42"));
    assert_eq!(executor.get_state("t").await.unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_step_timeout_is_a_step_failure() {
    let executor = Executor::with_config(
        flaky_graph(Arc::new(AtomicUsize::new(0)), Some(Duration::from_millis(500))),
        Arc::new(InMemoryCheckpointStore::new()),
        ExecutorConfig::default().with_step_timeout(Duration::from_millis(20)),
    );

    let outcome = executor.run("t", None).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Error);
    assert!(outcome.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(executor.get_history("t", None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_lowered_budget_stops_the_loop() {
    let generations = Arc::new(AtomicUsize::new(0));
    let executor = memory_executor(revision_graph(Arc::clone(&generations), &["reflect"]));
    executor.run("t", input(3)).await.unwrap();

    executor
        .update_state("t", StateUpdate::new().set("max_revisions", 1), None)
        .await
        .unwrap();
    let outcome = executor.resume("t", ResumeDecision::approve()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Error);
    assert_eq!(outcome.next, vec!["generate"]);
    assert_eq!(outcome.state["revision_number"], json!(1));
    assert_eq!(generations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_state_merges_and_routes() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &["reflect"]));
    let paused = executor.run("t", input(3)).await.unwrap();
    assert_eq!(paused.next, vec!["reflect"]);

    // Without a node, next is kept
    let edited = executor
        .update_state("t", StateUpdate::new().set("drafts", json!(["edited"])), None)
        .await
        .unwrap();
    assert_eq!(edited.next, vec!["reflect"]);
    assert_eq!(edited.state["drafts"], json!(["draft 1", "edited"]));
    assert_eq!(edited.status, RunStatus::Interrupted);
    assert_eq!(edited.metadata.extra["updated_by"], json!("manual"));

    // Attributed to generate, routing is re-evaluated: 3 >= 3 ends the thread
    let finished = executor
        .update_state(
            "t",
            StateUpdate::new().set("revision_number", 3),
            Some("generate"),
        )
        .await
        .unwrap();
    assert!(finished.next.is_empty());
    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(finished.metadata.writer.as_deref(), Some("generate"));

    assert!(matches!(
        executor.update_state("other", StateUpdate::new(), None).await,
        Err(GraphError::ThreadNotFound(_))
    ));
}

#[tokio::test]
async fn test_input_on_finished_thread_starts_new_turn() {
    let generations = Arc::new(AtomicUsize::new(0));
    let executor = memory_executor(revision_graph(Arc::clone(&generations), &[]));
    executor.run("t", input(1)).await.unwrap();

    let outcome = executor.run("t", input(2)).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.state["revision_number"], json!(2));
    assert_eq!(generations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_run_with_events() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &[]));
    let (tx, mut rx) = mpsc::channel(32);

    executor.run_with_events("t", input(1), tx).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        ExecutionEvent::NodeStarted {
            node: "generate".to_string()
        }
    );
    assert!(matches!(&events[1], ExecutionEvent::NodeCompleted { node, .. } if node == "generate"));
    assert_eq!(events[2], ExecutionEvent::Completed);
}

#[tokio::test]
async fn test_threads_run_concurrently() {
    let executor = Arc::new(memory_executor(revision_graph(
        Arc::new(AtomicUsize::new(0)),
        &[],
    )));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.run(&format!("thread-{}", i), input(i + 1)).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.state["revision_number"], json!(i as i64 + 1));
    }
    assert_eq!(executor.list_threads().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_state_manager_views() {
    let executor = memory_executor(revision_graph(Arc::new(AtomicUsize::new(0)), &["reflect"]));
    executor.run("t", input(2)).await.unwrap();
    let manager = StateManager::new(&executor, "t");

    assert_eq!(manager.get_value("revision_number").await.unwrap(), Some(json!(1)));
    assert_eq!(manager.get_value("missing").await.unwrap(), None);

    let fields = manager.fields_info().await.unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["revision_number", "max_revisions", "drafts", "count"]);
    assert_eq!(fields[0].label, "Revision");
    assert!(!fields[3].editable);

    let history = manager.history(None).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].index, 0);
    assert_eq!(history[0].writer.as_deref(), Some("generate"));
    assert_eq!(history[2].step, -1);

    let state = manager
        .checkpoint_state(&history[1].checkpoint_id)
        .await
        .unwrap();
    assert_eq!(state["revision_number"], json!(0));

    let updated = manager
        .update_value("max_revisions", json!(5), None)
        .await
        .unwrap();
    assert_eq!(updated.state["max_revisions"], json!(5));
    assert!(manager.update_value("count", json!(9), None).await.is_err());

    let summary = manager.snapshots_summary(10).await.unwrap();
    assert!(summary.contains("[0]"));
    assert!(summary.contains("next: reflect"));
    assert!(summary.contains("(end)") || summary.contains("next: generate"));
}

#[tokio::test]
async fn test_thread_survives_restart_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads.db");
    let generations = Arc::new(AtomicUsize::new(0));

    {
        let store = SqliteCheckpointStore::open(&path).await.unwrap();
        let executor = Executor::new(
            revision_graph(Arc::clone(&generations), &["reflect"]),
            Arc::new(store.clone()),
        );
        let outcome = executor.run("t", input(2)).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Interrupted);
        store.close().await;
    }

    let store = SqliteCheckpointStore::open(&path).await.unwrap();
    let executor = Executor::new(
        revision_graph(Arc::clone(&generations), &["reflect"]),
        Arc::new(store),
    );
    assert_eq!(
        executor.get_state("t").await.unwrap().status,
        RunStatus::Interrupted
    );

    let outcome = executor.resume("t", ResumeDecision::approve()).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.state["revision_number"], json!(2));
    assert_eq!(generations.load(Ordering::SeqCst), 2);
}
