//! `tether status` — store and config overview.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use tether_core::store::queue::CommandQueue;
use tether_core::store::snapshot::SnapshotStore;

use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
struct StatusOutput {
    user: String,
    orgs: Vec<String>,
    mirror_database: String,
    interval_secs: u64,
    snapshots: u64,
    pending_commands: u64,
}

/// Execute `tether status`.
pub fn run_status(_args: &StatusArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = super::load_config(output, project_root)?;
    let conn = super::open_store(project_root)?;

    let payload = StatusOutput {
        user: config.user,
        orgs: config.orgs,
        mirror_database: config.mirror_database,
        interval_secs: config.interval_secs,
        snapshots: SnapshotStore::new(&conn).count()?,
        pending_commands: CommandQueue::new(&conn).count()?,
    };

    render(output, &payload, |status, w| {
        pretty_kv(w, "user", &status.user)?;
        pretty_kv(w, "orgs", status.orgs.join(", "))?;
        pretty_kv(w, "database", &status.mirror_database)?;
        pretty_kv(w, "interval", format!("{}s", status.interval_secs))?;
        pretty_kv(w, "snapshots", status.snapshots.to_string())?;
        pretty_kv(w, "pending", status.pending_commands.to_string())?;
        Ok(())
    })
}
