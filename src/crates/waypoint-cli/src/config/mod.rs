//! Configuration management for waypoint
//!
//! Supports layered configuration:
//! - User-level: ~/.waypoint/waypoint.toml
//! - Project-level: ./.waypoint/waypoint.toml
//! - Explicit: `--config PATH`

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    DatabaseConfig, ExecutionConfig, LlmConfig, LoggingConfig, WaypointConfig, WebSearchConfig,
};

use crate::error::Result;
use std::path::Path;

/// Load configuration from every layer, with `explicit` on top
pub async fn load_config(explicit: Option<&Path>) -> Result<WaypointConfig> {
    let loader = match explicit {
        Some(path) => ConfigLoader::new().with_explicit(path),
        None => ConfigLoader::new(),
    };
    loader.load().await
}
