//! Waypoint command-line front end
//!
//! Layered TOML configuration, client wiring, and the `waypoint` commands for
//! running, approving, rewinding and inspecting threads of the prebuilt graphs.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;

pub use config::{load_config, ConfigLoader, WaypointConfig};
pub use context::AppContext;
pub use error::{CliError, Result};
