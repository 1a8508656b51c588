//! Model and search clients for waypoint graphs.
//!
//! This crate provides concrete implementations of the `ModelCaller` and
//! `SearchCaller` traits from `waypoint-core`.
//!
//! # Local Providers
//!
//! - **Ollama** - local LLM runner with wide model support
//!
//! # Remote Providers
//!
//! - **OpenAI-compatible** - any `/chat/completions` endpoint
//! - **Tavily** - web search used by the research steps
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm::local::OllamaClient;
//! use llm::config::LocalLlmConfig;
//! use waypoint_core::{ModelCaller, ModelParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OllamaClient::new(LocalLlmConfig::from_env())?;
//!     let reply = client
//!         .invoke("You are a helpful assistant.", "What is Rust?", ModelParams::default())
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "remote")]
pub mod remote;

pub use config::{LocalLlmConfig, RemoteLlmConfig, SearchConfig};
pub use error::{LlmError, Result};

#[cfg(feature = "local")]
pub use local::OllamaClient;

#[cfg(feature = "remote")]
pub use remote::{OpenAiClient, TavilyClient};
