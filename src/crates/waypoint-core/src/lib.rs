//! # waypoint-core - Checkpointed, interruptible LLM workflows
//!
//! A workflow is a fixed [`Graph`] of named step functions over a typed state
//! record. The [`Executor`] advances one *thread* of that graph at a time,
//! persisting a checkpoint after every step, which makes every thread:
//!
//! - **durable**: a thread survives restarts when backed by a persistent store,
//! - **interruptible**: nodes in the [`InterruptPolicy`] wait for a
//!   [`ResumeDecision`] before they run,
//! - **rewindable**: [`Executor::resume_from`] branches from any older checkpoint,
//! - **editable**: [`Executor::update_state`] applies operator edits through the
//!   same reducer as every step.
//!
//! ## Building blocks
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`state`] | schema, merge policies, reducers, typed state trait |
//! | [`graph`], [`builder`] | immutable graph definition and its builder |
//! | [`executor`] | the run loop and every caller-facing operation |
//! | [`manager`] | per-thread inspection (`fields_info`, history, edits) |
//! | [`messages`] | tagged message-log entries and tool calls |
//! | [`tool_call`] | tool-call detection in raw model text |
//! | [`tool`] | tool registry and error-absorbing tool executor |
//! | [`llm`] | model and search collaborator traits |
//! | [`testing`] | scripted model and search doubles |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypoint_checkpoint::InMemoryCheckpointStore;
//! use waypoint_core::{END, Executor, GraphBuilder, StateMap, StateUpdate};
//!
//! # async fn example() -> waypoint_core::Result<()> {
//! let mut builder = GraphBuilder::<StateMap>::new("greeter");
//! builder
//!     .add_node("greet", |_state: StateMap| async {
//!         Ok(StateUpdate::new().set("greeting", "hello"))
//!     })
//!     .add_edge("greet", END)
//!     .set_entry("greet");
//!
//! let executor = Executor::new(
//!     Arc::new(builder.compile()?),
//!     Arc::new(InMemoryCheckpointStore::new()),
//! );
//! let outcome = executor.run("thread-1", None).await?;
//! assert_eq!(outcome.state["greeting"], "hello");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod executor;
pub mod graph;
pub mod interrupt;
pub mod llm;
pub mod manager;
pub mod messages;
pub mod state;
pub mod testing;
pub mod tool;
pub mod tool_call;

pub use builder::GraphBuilder;
pub use error::{GraphError, Result};
pub use executor::{ExecutionEvent, Executor, ExecutorConfig, RunOutcome, RunStatus, ThreadSnapshot};
pub use graph::{Graph, GraphInfo, NodeId, END};
pub use interrupt::{InterruptPolicy, ResumeDecision};
pub use llm::{ModelCaller, ModelParams, SearchCaller, SearchResult};
pub use manager::{FieldInfo, HistoryEntry, StateManager};
pub use messages::{Message, ToolCall};
pub use state::{
    FieldKind, FieldSpec, GraphState, MergePolicy, StateError, StateMap, StateSchema, StateUpdate,
};
pub use tool::{Tool, ToolArgs, ToolError, ToolRegistry, ToolResult};
pub use tool_call::{TextToolCallDetector, ToolCallParser};
pub use waypoint_checkpoint::{Checkpoint, CheckpointSource, CheckpointStore};
