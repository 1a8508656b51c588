//! Trip planner: the revision pipeline with travel prompts and a status log.
//!
//! Every node also appends an AI status message to `messages`, so a chat
//! view can follow the run step by step.

use super::revision::{revision_graph, RevisionFlavor};
use crate::error::Result;
use crate::prompts::PromptDefault;
use std::sync::Arc;
use waypoint_core::{Graph, ModelCaller, SearchCaller};

pub const PLANNER_PROMPT: &str = "You are an expert travel planner tasked with creating a high-level outline for a trip.

Create an outline for the user's travel destination and preferences. Be creative and think of unique experiences.

Your outline should include:
- Trip overview (duration, best time to visit, key highlights)
- Main activities/attractions (3-5 must-see/do items)
- Practical considerations (budget range, transportation, accommodation suggestions)

Keep it concise but inspiring.";

pub const TRAVEL_PLAN_PROMPT: &str = "You are a travel researcher charged with providing detailed information for trip planning.

Generate a list of search queries that will gather practical travel information. Only generate 3 queries max.

Focus on:
- Current travel conditions and requirements (visas, weather, etc.)
- Top attractions, activities, and experiences
- Practical tips (budget, safety, local customs, transportation)

Return your queries as a JSON array of strings.";

pub const GENERATOR_PROMPT: &str = "You are a travel itinerary planner tasked with creating detailed, practical trip plans.

Use the provided research content and outline to create a comprehensive trip itinerary.

Guidelines:
- Create a day-by-day itinerary with specific activities and timings
- Include practical details (estimated costs, transportation, booking tips)
- Suggest restaurants, accommodations, and local experiences
- Provide insider tips and warnings from the research
- Balance popular attractions with unique local experiences

Write clearly and practically for travelers who want actionable information.";

pub const CRITIC_PROMPT: &str = "You are an experienced travel advisor reviewing a trip itinerary.

Generate critique and recommendations for the trip plan. Be constructive but thorough.

Evaluate:
- Practicality and feasibility (timing, logistics, budget)
- Balance of activities (not too rushed or too empty)
- Coverage of must-see attractions vs. unique experiences
- Missing important information (visas, safety, booking tips)
- Areas for improvement or alternatives

Provide specific, actionable feedback to improve the trip plan.";

pub const TRAVEL_CRITIQUE_PROMPT: &str = "You are a travel research assistant helping to address critique feedback.

Generate search queries to find additional information that addresses the specific gaps or concerns in the critique.
Only generate 2 queries max.

Focus on finding:
- Missing practical details (costs, transportation, bookings)
- Alternative activities or experiences
- Clarifying information about logistics or requirements

Return your queries as a JSON array of strings.";

pub static TRIP: RevisionFlavor = RevisionFlavor {
    graph_name: "trip",
    research_node: "travel_plan",
    critique_research_node: "travel_critique",
    planner: PromptDefault {
        key: "planner_prompt",
        node: "planner",
        label: "Planner prompt",
        text: PLANNER_PROMPT,
    },
    research: PromptDefault {
        key: "travel_plan_prompt",
        node: "travel_plan",
        label: "Travel research prompt",
        text: TRAVEL_PLAN_PROMPT,
    },
    generator: PromptDefault {
        key: "generator_prompt",
        node: "generate",
        label: "Itinerary prompt",
        text: GENERATOR_PROMPT,
    },
    critic: PromptDefault {
        key: "critic_prompt",
        node: "reflect",
        label: "Travel advisor prompt",
        text: CRITIC_PROMPT,
    },
    critique_research: PromptDefault {
        key: "travel_critique_prompt",
        node: "travel_critique",
        label: "Follow-up research prompt",
        text: TRAVEL_CRITIQUE_PROMPT,
    },
    topic_label: "Destination/Trip",
    outline_label: "Trip Outline",
    review_label: "Trip itinerary to review",
    status_messages: true,
};

pub fn trip_planner_graph(
    model: Arc<dyn ModelCaller>,
    search: Arc<dyn SearchCaller>,
    interrupts: bool,
) -> Result<Graph> {
    revision_graph(&TRIP, model, search, interrupts)
}
