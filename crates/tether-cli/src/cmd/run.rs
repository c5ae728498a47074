//! `tether run` — the reconciliation loop.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;

use tether_core::engine::runner::{self, LoopOptions};
use tether_core::engine::{CycleReport, Engine};

use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Run a single reconciliation cycle and exit.
    #[arg(long)]
    pub once: bool,

    /// Seconds between cycles (overrides the configured interval).
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Execute `tether run`.
///
/// Without `--once` this blocks until SIGINT or SIGTERM; cycle outcomes
/// go to the log. The signal raises the loop's stop flag, so an
/// in-flight apply always completes before the process exits, and
/// anything still queued survives in the store for the next start.
pub fn run_run(args: &RunArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = super::load_config(output, project_root)?;
    let (tracker, mirror) = super::build_adapters(&config)?;
    let conn = super::open_store(project_root)?;

    let mut engine = Engine::new(conn, tracker, mirror, config.scope());
    let options = LoopOptions {
        interval: args
            .interval
            .map_or_else(|| config.interval(), Duration::from_secs),
        once: args.once,
    };

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))
        .context("register SIGTERM handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))
        .context("register SIGINT handler")?;

    let last = runner::run(&mut engine, &options, &stop)?;

    if let Some(report) = last {
        render(output, &report, render_human)?;
        if !report.errors.is_empty() {
            anyhow::bail!("{} error(s) during the last cycle", report.errors.len());
        }
    }
    Ok(())
}

fn render_human(report: &CycleReport, w: &mut dyn Write) -> std::io::Result<()> {
    let fetch = |ok: bool, count: usize| {
        if ok {
            format!("ok ({count} records)")
        } else {
            "FAILED, side skipped".to_string()
        }
    };
    pretty_kv(w, "tracker", fetch(report.tracker_fetch_ok, report.tracker_records))?;
    pretty_kv(w, "mirror", fetch(report.mirror_fetch_ok, report.mirror_records))?;
    pretty_kv(w, "enqueued", report.enqueued.to_string())?;
    pretty_kv(w, "applied", report.applied.to_string())?;
    pretty_kv(w, "retried", report.retried.to_string())?;
    pretty_kv(w, "rejected", report.rejected.to_string())?;
    pretty_kv(w, "conflicts", report.conflicts.to_string())?;
    pretty_kv(w, "repaired", report.repaired.to_string())?;
    pretty_kv(w, "first seen", report.first_seen.to_string())?;
    pretty_kv(w, "missing", report.missing.to_string())?;
    if !report.errors.is_empty() {
        writeln!(w)?;
        writeln!(w, "errors:")?;
        for error in &report.errors {
            writeln!(w, "  {error}")?;
        }
    }
    Ok(())
}
