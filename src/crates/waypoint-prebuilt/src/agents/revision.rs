//! Revision pipelines - plan, research, then draft and critique in a bounded loop
//!
//! The essay writer and the trip planner share one topology and differ only in
//! node names, prompts and message wording, captured by a [`RevisionFlavor`]:
//!
//! ```text
//! planner → <research> → generate ──(revision_number >= max_revisions)──→ END
//!                           ↑   │
//!                           │   └──→ reflect → <critique research> ─┐
//!                           └───────────────────────────────────────┘
//! ```
//!
//! `generate` is the only node that touches `revision_number` (it increments
//! it), so the loop runs `generate` at most `max_revisions` times; a
//! `generate` step whose budget is already spent fails instead of drafting. With
//! interrupts enabled the graph pauses before `planner`, `generate` and
//! `reflect`.
//!
//! Every node reads its system prompt from the state field named by the
//! flavor (falling back to the built-in default), and its sampling
//! parameters from `temperature` / `max_tokens`.

use crate::error::Result;
use crate::prompts::{PromptDefault, PromptSet};
use crate::queries::{parse_queries, run_searches};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::info;
use waypoint_core::{
    FieldKind, FieldSpec, Graph, GraphBuilder, GraphError, GraphState, Message, ModelCaller,
    ModelParams, SearchCaller, StateMap, StateSchema, StateUpdate, END,
};

pub const DEFAULT_MAX_REVISIONS: i64 = 2;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Queries run by the planning research step
pub const PLAN_QUERY_LIMIT: usize = 3;
/// Queries run by the critique research step
pub const CRITIQUE_QUERY_LIMIT: usize = 2;

/// Nodes that wait for approval when interrupts are enabled
pub const REVISION_INTERRUPTS: [&str; 3] = ["planner", "generate", "reflect"];

/// Working state of a revision pipeline.
///
/// Prompt fields vary by flavor and are kept in `prompts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionState {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub draft: String,
    #[serde(default)]
    pub critique: String,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub revision_number: i64,
    #[serde(default = "default_max_revisions")]
    pub max_revisions: i64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub prompts: StateMap,
}

fn default_max_revisions() -> i64 {
    DEFAULT_MAX_REVISIONS
}

impl RevisionState {
    /// Prompt stored under `key`, or `fallback` when unset or blank
    pub fn prompt<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.prompts
            .get(key)
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(fallback)
    }

    pub fn params(&self) -> ModelParams {
        ModelParams::new(
            self.temperature.unwrap_or(DEFAULT_TEMPERATURE) as f32,
            self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        )
    }
}

impl GraphState for RevisionState {
    fn schema() -> StateSchema {
        revision_schema(&[], false)
    }
}

fn revision_schema(prompts: &[PromptDefault], with_messages: bool) -> StateSchema {
    let mut schema = StateSchema::new()
        .field(FieldSpec::new("task", FieldKind::Text).label("Task"))
        .field(FieldSpec::new("plan", FieldKind::Text).label("Plan"))
        .field(FieldSpec::new("draft", FieldKind::Text).label("Draft"))
        .field(FieldSpec::new("critique", FieldKind::Text).label("Critique"))
        .field(FieldSpec::new("content", FieldKind::TextList).label("Research content"))
        .field(FieldSpec::new("queries", FieldKind::TextList).label("Search queries"))
        .field(
            FieldSpec::new("revision_number", FieldKind::Integer)
                .label("Revision")
                .default_value(json!(0)),
        )
        .field(
            FieldSpec::new("max_revisions", FieldKind::Integer)
                .label("Max revisions")
                .default_value(json!(DEFAULT_MAX_REVISIONS)),
        );

    for prompt in prompts {
        schema.add_field(FieldSpec::new(prompt.key, FieldKind::Text).label(prompt.label));
    }

    schema = schema
        .field(
            FieldSpec::new("temperature", FieldKind::Number)
                .label("Temperature")
                .default_value(json!(DEFAULT_TEMPERATURE)),
        )
        .field(
            FieldSpec::new("max_tokens", FieldKind::Integer)
                .label("Max tokens")
                .default_value(json!(DEFAULT_MAX_TOKENS)),
        )
        .field(
            FieldSpec::new("count", FieldKind::Integer)
                .accumulate()
                .label("Steps run")
                .default_value(json!(0))
                .read_only(),
        );

    if with_messages {
        schema.add_field(
            FieldSpec::new("messages", FieldKind::Messages)
                .accumulate()
                .label("Messages")
                .default_value(json!([])),
        );
    }
    schema
}

/// Names, prompts and wording that distinguish one revision pipeline
#[derive(Debug)]
pub struct RevisionFlavor {
    pub graph_name: &'static str,
    /// Research node between `planner` and `generate`
    pub research_node: &'static str,
    /// Research node between `reflect` and `generate`
    pub critique_research_node: &'static str,
    pub planner: PromptDefault,
    pub research: PromptDefault,
    pub generator: PromptDefault,
    pub critic: PromptDefault,
    pub critique_research: PromptDefault,
    /// Labels used in the generate and reflect inputs
    pub topic_label: &'static str,
    pub outline_label: &'static str,
    pub review_label: &'static str,
    /// Append an AI status message per step to `messages`
    pub status_messages: bool,
}

impl RevisionFlavor {
    pub fn prompt_defaults(&self) -> [PromptDefault; 5] {
        [
            self.planner,
            self.research,
            self.generator,
            self.critic,
            self.critique_research,
        ]
    }

    pub fn prompt_set(&self) -> PromptSet {
        PromptSet::new(self.graph_name, self.prompt_defaults())
    }

    pub fn schema(&self) -> StateSchema {
        revision_schema(&self.prompt_defaults(), self.status_messages)
    }
}

/// Route out of `generate`: stop once the revision budget is spent
pub fn should_continue(state: &RevisionState) -> &'static str {
    if state.revision_number >= state.max_revisions {
        END
    } else {
        "reflect"
    }
}

struct StepContext {
    model: Arc<dyn ModelCaller>,
    search: Arc<dyn SearchCaller>,
    flavor: &'static RevisionFlavor,
}

impl StepContext {
    async fn ask(&self, prompt: &PromptDefault, state: &RevisionState, user: &str) -> waypoint_core::Result<String> {
        let system = state.prompt(prompt.key, prompt.text);
        self.model.invoke(system, user, state.params()).await
    }

    fn with_status(&self, update: StateUpdate, status: String) -> waypoint_core::Result<StateUpdate> {
        if !self.flavor.status_messages {
            return Ok(update);
        }
        Ok(update.try_set("messages", &[Message::ai(status)])?)
    }

    async fn plan(self: Arc<Self>, state: RevisionState) -> waypoint_core::Result<StateUpdate> {
        info!(graph = self.flavor.graph_name, task = %truncate(&state.task, 50), "Planning");
        let plan = self.ask(&self.flavor.planner, &state, &state.task).await?;

        let status = format!(
            "**Step 1: Planning Complete**\n\nI've created an outline for: {}\n\n{}",
            state.task, plan
        );
        let update = StateUpdate::new().set("plan", plan).set("count", 1);
        self.with_status(update, status)
    }

    async fn research_plan(self: Arc<Self>, state: RevisionState) -> waypoint_core::Result<StateUpdate> {
        let reply = self.ask(&self.flavor.research, &state, &state.task).await?;
        let queries = parse_queries(&reply);
        info!(node = self.flavor.research_node, queries = queries.len(), "Researching");

        let content = run_searches(self.search.as_ref(), &queries, PLAN_QUERY_LIMIT).await;
        info!(node = self.flavor.research_node, sources = content.len(), "Research complete");

        let status = format!(
            "**Step 2: Research Complete**\n\nI searched for:\n{}\n\nFound {} relevant sources.",
            bullet_list(&queries, PLAN_QUERY_LIMIT),
            content.len()
        );
        let update = StateUpdate::new()
            .set("content", content)
            .set("queries", queries)
            .set("count", 1);
        self.with_status(update, status)
    }

    async fn generate(self: Arc<Self>, state: RevisionState) -> waypoint_core::Result<StateUpdate> {
        if state.revision_number >= state.max_revisions {
            return Err(GraphError::step(
                "generate",
                format!(
                    "revision budget spent ({} of {})",
                    state.revision_number, state.max_revisions
                ),
            ));
        }
        let revision = state.revision_number + 1;
        info!(graph = self.flavor.graph_name, revision, "Generating draft");

        let prompt = state.prompt(self.flavor.generator.key, self.flavor.generator.text);
        let system = format!("{}\n\nResearch content:\n{}", prompt, state.content.join("\n\n"));
        let user = format!(
            "{}: {}\n\n{}:\n{}",
            self.flavor.topic_label, state.task, self.flavor.outline_label, state.plan
        );
        let draft = self.model.invoke(&system, &user, state.params()).await?;

        let status = if revision == 1 {
            format!("**Step 3: Draft Created**\n\n{}", draft)
        } else {
            format!("**Step 5: Draft Revised (Revision {})**\n\n{}", revision, draft)
        };
        let update = StateUpdate::new()
            .set("draft", draft)
            .set("revision_number", revision)
            .set("count", 1);
        self.with_status(update, status)
    }

    async fn reflect(self: Arc<Self>, state: RevisionState) -> waypoint_core::Result<StateUpdate> {
        info!(graph = self.flavor.graph_name, revision = state.revision_number, "Critiquing draft");
        let user = format!("{}:\n\n{}", self.flavor.review_label, state.draft);
        let critique = self.ask(&self.flavor.critic, &state, &user).await?;

        let status = format!("**Step 4: Review**\n\nHere's my feedback on the draft:\n\n{}", critique);
        let update = StateUpdate::new().set("critique", critique).set("count", 1);
        self.with_status(update, status)
    }

    async fn research_critique(self: Arc<Self>, state: RevisionState) -> waypoint_core::Result<StateUpdate> {
        let reply = self
            .ask(&self.flavor.critique_research, &state, &state.critique)
            .await?;
        let queries = parse_queries(&reply);

        let found = run_searches(self.search.as_ref(), &queries, CRITIQUE_QUERY_LIMIT).await;
        info!(node = self.flavor.critique_research_node, sources = found.len(), "Follow-up research complete");

        let status = format!(
            "**Additional Research**\n\nTo address the feedback, I searched for:\n{}\n\nFound {} additional sources. Now revising...",
            bullet_list(&queries, CRITIQUE_QUERY_LIMIT),
            found.len()
        );
        let mut content = state.content;
        content.extend(found);
        let update = StateUpdate::new().set("content", content).set("count", 1);
        self.with_status(update, status)
    }
}

fn bullet_list(items: &[String], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Bind a step method to the shared context
fn bind<F, Fut>(
    ctx: &Arc<StepContext>,
    step: F,
) -> impl Fn(RevisionState) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<StepContext>, RevisionState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = waypoint_core::Result<StateUpdate>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    move |state: RevisionState| step(Arc::clone(&ctx), state)
}

/// Build a revision pipeline for `flavor`
pub fn revision_graph(
    flavor: &'static RevisionFlavor,
    model: Arc<dyn ModelCaller>,
    search: Arc<dyn SearchCaller>,
    interrupts: bool,
) -> Result<Graph> {
    let ctx = Arc::new(StepContext {
        model,
        search,
        flavor,
    });

    let mut builder = GraphBuilder::<RevisionState>::new(flavor.graph_name);
    builder
        .with_schema(flavor.schema())
        .add_node("planner", bind(&ctx, StepContext::plan))
        .add_node(flavor.research_node, bind(&ctx, StepContext::research_plan))
        .add_node("generate", bind(&ctx, StepContext::generate))
        .add_node("reflect", bind(&ctx, StepContext::reflect))
        .add_node(
            flavor.critique_research_node,
            bind(&ctx, StepContext::research_critique),
        )
        .describe_node("planner", "Write a high-level outline")
        .describe_node(flavor.research_node, "Search for material on the task")
        .describe_node("generate", "Write the next draft")
        .describe_node("reflect", "Critique the current draft")
        .describe_node(
            flavor.critique_research_node,
            "Search for material addressing the critique",
        )
        .set_entry("planner")
        .add_edge("planner", flavor.research_node)
        .add_edge(flavor.research_node, "generate")
        .add_conditional_edge("generate", should_continue, ["reflect", END])
        .add_edge("reflect", flavor.critique_research_node)
        .add_edge(flavor.critique_research_node, "generate");

    if interrupts {
        builder.interrupt_before(REVISION_INTERRUPTS);
    }

    Ok(builder.compile()?)
}
