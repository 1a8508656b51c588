//! Configuration loader with layered files
//!
//! Loads configuration from, in increasing precedence:
//! 1. Default values
//! 2. User-level config: ~/.waypoint/waypoint.toml
//! 3. Project-level config: ./.waypoint/waypoint.toml
//! 4. An explicit file passed with `--config`
//!
//! Files are merged key by key, so a later file only overrides the keys it
//! sets.

use crate::config::schema::WaypointConfig;
use crate::error::{CliError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const CONFIG_DIR: &str = ".waypoint";
const CONFIG_FILE: &str = "waypoint.toml";

pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: PathBuf::from(CONFIG_DIR).join(CONFIG_FILE),
            explicit_path: None,
        }
    }

    /// Add a file that overrides both standard locations; it must exist
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    pub fn with_user_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_config_path = Some(path.into());
        self
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config_path = path.into();
        self
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }

    /// Load and merge every layer, then resolve `${VAR}` values
    pub async fn load(&self) -> Result<WaypointConfig> {
        let mut merged = toml::Table::new();

        let optional = self
            .user_config_path
            .iter()
            .chain(std::iter::once(&self.project_config_path));
        for path in optional {
            if !path.exists() {
                debug!(path = %path.display(), "Config file not found, skipping");
                continue;
            }
            merge_tables(&mut merged, read_table(path).await?);
            debug!(path = %path.display(), "Loaded config layer");
        }

        if let Some(path) = &self.explicit_path {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            merge_tables(&mut merged, read_table(path).await?);
            debug!(path = %path.display(), "Loaded explicit config");
        }

        let mut config: WaypointConfig = toml::Value::Table(merged)
            .try_into::<WaypointConfig>()
            .map_err(|e| CliError::Config(format!("Failed to parse config: {}", e)))?;
        config.resolve_env_vars();

        info!("Configuration loaded");
        Ok(config)
    }

    /// Load a single file on top of the defaults
    pub async fn load_from_path(path: &Path) -> Result<WaypointConfig> {
        if !path.exists() {
            return Err(CliError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        toml::Value::Table(read_table(path).await?)
            .try_into::<WaypointConfig>()
            .map_err(|e| CliError::Config(format!("Failed to parse config: {}", e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_table(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    content
        .parse::<toml::Table>()
        .map_err(|e| CliError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Deep-merge `overlay` into `base`; nested tables merge, anything else is replaced
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let incoming = match value {
            toml::Value::Table(incoming) => incoming,
            other => {
                base.insert(key, other);
                continue;
            }
        };
        if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, toml::Value::Table(incoming));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let loader = ConfigLoader::new();
        assert!(loader.project_config_path().ends_with(".waypoint/waypoint.toml"));
        if let Some(user) = loader.user_config_path() {
            assert!(user.ends_with(".waypoint/waypoint.toml"));
        }
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: toml::Table = "[llm]\nprovider = \"openai\"\nmodel = \"a\"\n".parse().unwrap();
        let overlay: toml::Table = "[llm]\nmodel = \"b\"\n[logging]\nlevel = \"debug\"\n"
            .parse()
            .unwrap();
        merge_tables(&mut base, overlay);

        assert_eq!(base["llm"]["provider"].as_str(), Some("openai"));
        assert_eq!(base["llm"]["model"].as_str(), Some("b"));
        assert_eq!(base["logging"]["level"].as_str(), Some("debug"));
    }
}
