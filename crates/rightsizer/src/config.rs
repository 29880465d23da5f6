//! Daemon configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment prefix for daemon settings, e.g. `RIGHTSIZER_INVENTORY_PATH`
const ENV_PREFIX: &str = "RIGHTSIZER";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RightsizerConfig {
    /// JSON inventory of managed targets
    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,

    /// Name used in structured log events
    #[serde(default = "default_controller_name")]
    pub controller_name: String,

    /// Compute and report changes without writing them
    #[serde(default)]
    pub default_dry_run: bool,
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("/etc/rightsizer/inventory.json")
}

fn default_controller_name() -> String {
    "rightsizer".to_string()
}

impl Default for RightsizerConfig {
    fn default() -> Self {
        Self {
            inventory_path: default_inventory_path(),
            controller_name: default_controller_name(),
            default_dry_run: false,
        }
    }
}

impl RightsizerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid rightsizer configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = RightsizerConfig::from_source(env(&[])).unwrap();
        assert_eq!(config.controller_name, "rightsizer");
        assert_eq!(config.inventory_path, PathBuf::from("/etc/rightsizer/inventory.json"));
        assert!(!config.default_dry_run);
    }

    #[test]
    fn test_environment_overrides() {
        let config = RightsizerConfig::from_source(env(&[
            ("RIGHTSIZER_INVENTORY_PATH", "/tmp/targets.json"),
            ("RIGHTSIZER_DEFAULT_DRY_RUN", "true"),
        ]))
        .unwrap();
        assert_eq!(config.inventory_path, PathBuf::from("/tmp/targets.json"));
        assert!(config.default_dry_run);
    }
}
