use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Ecosystem;

/// Root configuration structure, deserialized from `.sbom-modules/config.toml`.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub resolve: ResolveConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Any `EnvFilter` directive (`"info"`, `"sbom_modules=debug"`).
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// What to resolve and how.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolveConfig {
    /// Nested dependency trees instead of the flat module list.
    pub dependency_tree: bool,
    /// Run the license file scanner on each installed package.
    pub scan_licenses: bool,
    /// Ecosystems never detected.
    pub exclude: Vec<Ecosystem>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            dependency_tree: false,
            scan_licenses: true,
            exclude: Vec::new(),
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.sbom-modules/config.toml`
/// 3. `~/.config/sbom-modules/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".sbom-modules").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("sbom-modules").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}
