//! Remote provider implementations.
//!
//! Cloud-hosted APIs that require an API key:
//!
//! - **OpenAI-compatible** chat completions (model caller)
//! - **Tavily** web search (search caller)

pub mod openai;
pub mod tavily;

pub use openai::OpenAiClient;
pub use tavily::{TavilyClient, TavilyHit};
