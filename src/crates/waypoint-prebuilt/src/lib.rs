//! # waypoint-prebuilt - Ready-made waypoint graphs
//!
//! Three fixed graphs built on [`waypoint_core`], plus the tools and prompts
//! they use:
//!
//! - **[Tool agent](agents::tool_agent)**: chat loop that detects JSON tool
//!   requests in plain model text and runs them after approval
//! - **[Essay writer](agents::essay)**: plan → research → draft, revised under
//!   critique until `max_revisions`
//! - **[Trip planner](agents::trip)**: the same pipeline for itineraries, with
//!   a step-by-step status log
//!
//! Models and search providers are injected as [`ModelCaller`] /
//! [`SearchCaller`] trait objects.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waypoint_checkpoint::InMemoryCheckpointStore;
//! use waypoint_core::{Executor, ResumeDecision};
//! use waypoint_prebuilt::GraphKind;
//!
//! let graph = GraphKind::Essay.build(model, search, true)?;
//! let executor = Executor::new(Arc::new(graph), Arc::new(InMemoryCheckpointStore::new()));
//!
//! let input = GraphKind::Essay.initial_input("The history of Rust", Some(2), None)?;
//! let outcome = executor.run("essay-1", Some(input)).await?;   // paused before planner
//! let outcome = executor.resume("essay-1", ResumeDecision::approve()).await?;
//! ```
//!
//! [`ModelCaller`]: waypoint_core::ModelCaller
//! [`SearchCaller`]: waypoint_core::SearchCaller

pub mod agents;
pub mod catalog;
pub mod error;
pub mod prompts;
pub mod queries;
pub mod tools;

pub use agents::{AgentState, RevisionState, ToolAgentConfig, REJECTION_MARKER};
pub use catalog::GraphKind;
pub use error::{PrebuiltError, Result};
pub use prompts::{PromptDefault, PromptEntry, PromptSet};
pub use tools::default_registry;
