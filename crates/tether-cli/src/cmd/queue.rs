//! `tether queue` — inspect pending commands.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Args;

use tether_core::model::Command;
use tether_core::store::queue::CommandQueue;

use crate::output::{OutputMode, render};

#[derive(Args, Debug, Default)]
pub struct QueueArgs {}

/// Execute `tether queue`.
pub fn run_queue(_args: &QueueArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    super::load_config(output, project_root)?;
    let conn = super::open_store(project_root)?;
    let commands = CommandQueue::new(&conn).dequeue_all()?;

    render(output, &commands, render_human)
}

fn render_human(commands: &Vec<Command>, w: &mut dyn Write) -> std::io::Result<()> {
    if commands.is_empty() {
        writeln!(w, "queue empty")?;
        return Ok(());
    }

    for command in commands {
        writeln!(
            w,
            "{}  -> {}  [{}]  {}",
            command.id,
            command.target,
            command.payload.field_names().join(", "),
            command.reason
        )?;
    }
    Ok(())
}
