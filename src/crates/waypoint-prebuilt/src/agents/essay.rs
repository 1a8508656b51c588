//! Essay writer: outline, research, then draft three-paragraph essays under critique

use super::revision::{revision_graph, RevisionFlavor};
use crate::error::Result;
use crate::prompts::PromptDefault;
use std::sync::Arc;
use waypoint_core::{Graph, ModelCaller, SearchCaller};

pub const PLANNER_PROMPT: &str = "You are an expert writer tasked with writing a high level outline of a short 3 paragraph essay.

Write such an outline for the user provided topic. Be creative and think of interesting angles to explore.

Your outline should include:
- Introduction hook
- Main points (2-3 key ideas)
- Conclusion approach

Keep it concise but engaging.";

pub const RESEARCH_PLAN_PROMPT: &str = "You are a researcher charged with providing information that can be used when writing an essay.

Generate a list of search queries that will gather relevant information. Only generate 3 queries max.

Focus on:
- Key facts and statistics
- Different perspectives
- Recent developments or examples

Return your queries as a JSON array of strings.";

pub const GENERATOR_PROMPT: &str = "You are an essay assistant tasked with writing excellent 3-paragraph essays.

Use the provided research content and outline to write a compelling essay.

Guidelines:
- Start with an engaging introduction
- Support main points with research and examples
- End with a thoughtful conclusion
- Keep paragraphs focused and well-structured
- Cite interesting facts from the research

Write clearly and engagingly for a general audience.";

pub const CRITIC_PROMPT: &str = "You are an instructor grading an essay submission.

Generate critique and recommendations for the student's draft. Be constructive but thorough.

Evaluate:
- Clarity and coherence
- Use of evidence and examples
- Strength of arguments
- Writing quality and flow
- Areas for improvement

Provide specific, actionable feedback.";

pub const RESEARCH_CRITIQUE_PROMPT: &str = "You are a research assistant helping to address critique feedback.

Generate search queries to find information that can help address the critique.
Only generate 2 queries max.

Focus on finding:
- Additional evidence or examples
- Counterarguments or different perspectives
- Clarifying information

Return your queries as a JSON array of strings.";

pub static ESSAY: RevisionFlavor = RevisionFlavor {
    graph_name: "essay",
    research_node: "research_plan",
    critique_research_node: "research_critique",
    planner: PromptDefault {
        key: "planner_prompt",
        node: "planner",
        label: "Planner prompt",
        text: PLANNER_PROMPT,
    },
    research: PromptDefault {
        key: "research_plan_prompt",
        node: "research_plan",
        label: "Research plan prompt",
        text: RESEARCH_PLAN_PROMPT,
    },
    generator: PromptDefault {
        key: "generator_prompt",
        node: "generate",
        label: "Generator prompt",
        text: GENERATOR_PROMPT,
    },
    critic: PromptDefault {
        key: "critic_prompt",
        node: "reflect",
        label: "Critic prompt",
        text: CRITIC_PROMPT,
    },
    critique_research: PromptDefault {
        key: "research_critique_prompt",
        node: "research_critique",
        label: "Research critique prompt",
        text: RESEARCH_CRITIQUE_PROMPT,
    },
    topic_label: "Topic",
    outline_label: "Outline",
    review_label: "Essay to critique",
    status_messages: false,
};

/// Essay writer graph; pauses before `planner`, `generate` and `reflect` when `interrupts` is set
pub fn essay_writer_graph(
    model: Arc<dyn ModelCaller>,
    search: Arc<dyn SearchCaller>,
    interrupts: bool,
) -> Result<Graph> {
    revision_graph(&ESSAY, model, search, interrupts)
}
