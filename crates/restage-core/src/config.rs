use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the structured configuration file at the top of the Installation
/// Root. It is both the file this crate reads and a required member of the
/// carryover allow-list.
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Git,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "source_kind_default")]
    pub kind: SourceKind,
    pub location: String,
    #[serde(default = "branch_default")]
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    pub entry_point: String,
    pub runtime: Option<String>,
    pub venv_dir: String,
    pub requirements_file: Option<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            entry_point: "bot.py".to_string(),
            runtime: None,
            venv_dir: "venv".to_string(),
            requirements_file: Some("requirements.txt".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarryoverConfig {
    pub credentials_file: String,
    pub extra_files: Vec<String>,
    pub database_extension: String,
}

impl Default for CarryoverConfig {
    fn default() -> Self {
        Self {
            credentials_file: ".env".to_string(),
            extra_files: vec!["config.json".to_string()],
            database_extension: "db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub grace_period_secs: u64,
    pub sentinel_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 3,
            sentinel_timeout_secs: 30,
            fetch_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub carryover: CarryoverConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
}

impl UpdateConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse restage config")?;
        if config.source.location.trim().is_empty() {
            return Err(anyhow!("source location must not be empty"));
        }
        if config.source.kind == SourceKind::Git && config.source.branch.trim().is_empty() {
            return Err(anyhow!("source branch must not be empty for git sources"));
        }
        if config.install.entry_point.trim().is_empty() {
            return Err(anyhow!("entry point must not be empty"));
        }
        if config.install.entry_point.contains('/') || config.install.entry_point.contains('\\') {
            return Err(anyhow!(
                "entry point must be a top-level file name: {}",
                config.install.entry_point
            ));
        }
        if config.carryover.database_extension.starts_with('.') {
            return Err(anyhow!(
                "database extension must not include a leading dot: {}",
                config.carryover.database_extension
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed loading config: {}", path.display()))
    }
}

fn source_kind_default() -> SourceKind {
    SourceKind::Git
}

fn branch_default() -> String {
    "main".to_string()
}
