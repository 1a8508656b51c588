//! Prebuilt graphs
//!
//! | Graph | Topology | Interrupts |
//! |-------|----------|------------|
//! | [`tool_agent`] | `agent ⇄ tools` | before `tools` |
//! | [`essay`] | plan → research → generate ⇄ (reflect → research) | before `planner`, `generate`, `reflect` |
//! | [`trip`] | same as essay, travel prompts + status messages | same as essay |
//!
//! Every graph also has a variant without interrupts that runs straight
//! through.

pub mod essay;
pub mod revision;
pub mod tool_agent;
pub mod trip;

pub use essay::{essay_writer_graph, ESSAY};
pub use revision::{RevisionFlavor, RevisionState, DEFAULT_MAX_REVISIONS};
pub use tool_agent::{AgentState, ToolAgentConfig, REJECTION_MARKER};
pub use trip::{trip_planner_graph, TRIP};
