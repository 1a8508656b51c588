//! Local LLM provider implementations.
//!
//! Providers running on localhost or the local network. No API keys.

pub mod ollama;

pub use ollama::OllamaClient;
