use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapter::TrackedScope;

/// Project-level configuration, read from `.tether/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tracker user whose personal repositories are tracked.
    #[serde(default)]
    pub user: String,
    /// Organizations whose repositories are tracked.
    #[serde(default)]
    pub orgs: Vec<String>,
    /// Mirror database id pages are created under.
    #[serde(default)]
    pub mirror_database: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Environment variable holding the tracker API token.
    #[serde(default = "default_tracker_token_env")]
    pub tracker_token_env: String,
    /// Environment variable holding the mirror API token.
    #[serde(default = "default_mirror_token_env")]
    pub mirror_token_env: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            orgs: Vec::new(),
            mirror_database: String::new(),
            interval_secs: default_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            tracker_token_env: default_tracker_token_env(),
            mirror_token_env: default_mirror_token_env(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn scope(&self) -> TrackedScope {
        TrackedScope {
            user: self.user.clone(),
            orgs: self.orgs.clone(),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

const fn default_interval_secs() -> u64 {
    60
}

const fn default_http_timeout_secs() -> u64 {
    30
}

fn default_tracker_token_env() -> String {
    "TETHER_TRACKER_TOKEN".to_string()
}

fn default_mirror_token_env() -> String {
    "TETHER_MIRROR_TOKEN".to_string()
}

/// Path of the project config file under `project_root`.
#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(".tether/config.toml")
}

/// Path of the sync store under `project_root`.
#[must_use]
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(".tether/sync.db")
}

/// Load the project config, falling back to defaults when the file does
/// not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load(project_root: &Path) -> Result<SyncConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<SyncConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `config` to `.tether/config.toml`, creating the directory.
///
/// # Errors
///
/// Returns an error on serialization or write failure.
pub fn save(project_root: &Path, config: &SyncConfig) -> Result<()> {
    let path = config_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("serialize config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}
