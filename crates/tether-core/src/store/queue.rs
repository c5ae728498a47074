//! Durable command queue with per-identity coalescing.
//!
//! The `(org, repo, number)` primary key means `enqueue` for an identity
//! that already has a pending command replaces it — last detected drift
//! wins. This is what prevents double-application and out-of-order
//! application of stale patches, and it doubles as the at-most-one
//! in-flight-command-per-identity discipline.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::adapter::Side;
use crate::model::command::Command;
use crate::model::patch::FieldPatch;
use crate::model::record::RecordId;
use crate::store::snapshot::now_us;

/// Read/write access to the `commands` table.
pub struct CommandQueue<'c> {
    conn: &'c Connection,
}

impl<'c> CommandQueue<'c> {
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert `command`, replacing any queued command for the same
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or write failure.
    pub fn enqueue(&self, command: &Command) -> Result<()> {
        let payload = serde_json::to_string(&command.payload)
            .with_context(|| format!("encode command payload for {}", command.id))?;

        self.conn
            .execute(
                "INSERT INTO commands (org, repo, number, target, payload, reason, created_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (org, repo, number) DO UPDATE SET
                     target = excluded.target,
                     payload = excluded.payload,
                     reason = excluded.reason,
                     created_at_us = excluded.created_at_us",
                params![
                    command.id.org,
                    command.id.repo,
                    command.id.number,
                    command.target.to_string(),
                    payload,
                    command.reason,
                    now_us()
                ],
            )
            .with_context(|| format!("enqueue command for {}", command.id))?;
        Ok(())
    }

    /// All pending commands in stable (org, repo, number) order.
    ///
    /// Commands stay queued until [`CommandQueue::remove`]; a crash mid
    /// cycle resumes from here rather than dropping detected drift.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure or if a stored payload does not
    /// deserialize (store corruption).
    pub fn dequeue_all(&self) -> Result<Vec<Command>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT org, repo, number, target, payload, reason
                 FROM commands ORDER BY org, repo, number",
            )
            .context("prepare command listing")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    RecordId {
                        org: row.get(0)?,
                        repo: row.get(1)?,
                        number: row.get(2)?,
                    },
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("list pending commands")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read pending command rows")?;

        let mut commands = Vec::with_capacity(rows.len());
        for (id, target, payload, reason) in rows {
            let target = parse_side(&target)
                .with_context(|| format!("decode command target for {id}"))?;
            let payload: FieldPatch = serde_json::from_str(&payload)
                .with_context(|| format!("decode command payload for {id}"))?;
            commands.push(Command::new(id, target, payload, reason));
        }

        Ok(commands)
    }

    /// Remove the pending command for `id`, if any. No-op when absent, so
    /// re-running after a crash is safe.
    ///
    /// # Errors
    ///
    /// Returns an error on write failure.
    pub fn remove(&self, id: &RecordId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM commands WHERE org = ?1 AND repo = ?2 AND number = ?3",
                params![id.org, id.repo, id.number],
            )
            .with_context(|| format!("remove command for {id}"))?;
        Ok(())
    }

    /// Number of pending commands.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commands", [], |row| row.get(0))
            .context("count pending commands")?;
        Ok(count)
    }
}

fn parse_side(s: &str) -> Result<Side> {
    match s {
        "tracker" => Ok(Side::Tracker),
        "mirror" => Ok(Side::Mirror),
        other => anyhow::bail!("unknown side '{other}'"),
    }
}
