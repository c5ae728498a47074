//! Command handlers for the `tether` binary.

pub mod import;
pub mod init;
pub mod queue;
pub mod run;
pub mod status;

use std::path::Path;

use anyhow::{Context as _, Result};
use rusqlite::Connection;

use tether_core::adapter::SideAdapter;
use tether_core::config::{self, SyncConfig};
use tether_core::error::ErrorCode;
use tether_core::store;

use crate::adapters::{self, mirror::MirrorAdapter, tracker::TrackerAdapter};
use crate::output::{CliError, OutputMode, render_error};

/// Load the project config, failing when the project was never
/// initialized.
pub fn load_config(output: OutputMode, project_root: &Path) -> Result<SyncConfig> {
    if !config::config_path(project_root).exists() {
        let code = ErrorCode::NotInitialized;
        render_error(
            output,
            &CliError::with_details(
                code.message(),
                code.hint().unwrap_or_default(),
                code.code(),
            ),
        )?;
        anyhow::bail!("{} {}", code.code(), code.message());
    }
    config::load(project_root)
}

/// Open the durable snapshot/queue store for this project.
pub fn open_store(project_root: &Path) -> Result<Connection> {
    store::open(&config::store_path(project_root))
}

fn token_from_env(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("missing API token: set the {var} env var"))
}

/// Build the two live side adapters from config plus token env vars.
pub fn build_adapters(
    config: &SyncConfig,
) -> Result<(Box<dyn SideAdapter>, Box<dyn SideAdapter>)> {
    anyhow::ensure!(
        !config.mirror_database.is_empty(),
        "mirror_database is not set in .tether/config.toml"
    );

    let agent = adapters::http_agent(config.http_timeout());
    let tracker = TrackerAdapter::new(agent.clone(), token_from_env(&config.tracker_token_env)?);
    let mirror = MirrorAdapter::new(
        agent,
        token_from_env(&config.mirror_token_env)?,
        config.mirror_database.clone(),
    );
    Ok((Box::new(tracker), Box::new(mirror)))
}
