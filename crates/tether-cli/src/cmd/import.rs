//! `tether import` — seed the mirror and the snapshot cache from the
//! tracker.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;

use tether_core::bootstrap::{self, ImportReport};

use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug, Default)]
pub struct ImportArgs {}

/// Execute `tether import`.
pub fn run_import(_args: &ImportArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = super::load_config(output, project_root)?;
    let (tracker, mirror) = super::build_adapters(&config)?;
    let conn = super::open_store(project_root)?;

    let report = bootstrap::seed(&conn, tracker.as_ref(), mirror.as_ref(), &config.scope())?;
    render(output, &report, render_human)?;

    if report.errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} record(s) failed to import", report.errors.len())
    }
}

fn render_human(report: &ImportReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "fetched", report.fetched.to_string())?;
    pretty_kv(w, "created", report.created.to_string())?;
    pretty_kv(w, "seeded", report.seeded.to_string())?;
    pretty_kv(w, "skipped", report.skipped.to_string())?;
    if !report.errors.is_empty() {
        writeln!(w)?;
        writeln!(w, "errors:")?;
        for error in &report.errors {
            writeln!(w, "  {error}")?;
        }
    }
    Ok(())
}
