//! Snapshot cache: the last record value known to be true on both sides.
//!
//! One row per identity, holding the full serialized [`Record`] so drift
//! detection never needs to re-fetch either side. Snapshots are created on
//! first reconciliation, overwritten after every successful command
//! application, and never deleted while the item exists on either side.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::record::{Record, RecordId};

/// Read/write access to the `snapshots` table.
///
/// Borrows a connection (or a transaction, which derefs to one) so the
/// applier can update a snapshot and remove a command atomically.
pub struct SnapshotStore<'c> {
    conn: &'c Connection,
}

impl<'c> SnapshotStore<'c> {
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Fetch the snapshot for `id`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure or if the stored record does not
    /// deserialize (store corruption).
    pub fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT record FROM snapshots WHERE org = ?1 AND repo = ?2 AND number = ?3",
                params![id.org, id.repo, id.number],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("query snapshot for {id}"))?;

        match json {
            Some(json) => {
                let record: Record = serde_json::from_str(&json)
                    .with_context(|| format!("decode stored snapshot for {id}"))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// True when a snapshot exists for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub fn has(&self, id: &RecordId) -> Result<bool> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM snapshots WHERE org = ?1 AND repo = ?2 AND number = ?3
                )",
                params![id.org, id.repo, id.number],
                |row| row.get(0),
            )
            .with_context(|| format!("check snapshot for {id}"))?;
        Ok(exists)
    }

    /// Insert or overwrite the snapshot for `record.id`.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or write failure.
    pub fn put(&self, record: &Record) -> Result<()> {
        let json = serde_json::to_string(record)
            .with_context(|| format!("encode snapshot for {}", record.id))?;

        self.conn
            .execute(
                "INSERT INTO snapshots (org, repo, number, record, updated_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (org, repo, number) DO UPDATE SET
                     record = excluded.record,
                     updated_at_us = excluded.updated_at_us",
                params![
                    record.id.org,
                    record.id.repo,
                    record.id.number,
                    json,
                    now_us()
                ],
            )
            .with_context(|| format!("write snapshot for {}", record.id))?;
        Ok(())
    }

    /// All identities with a snapshot, in stable (org, repo, number) order.
    ///
    /// The loop uses this to discover work after a restart and to notice
    /// identities that have gone missing from a side's fetch.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub fn list_ids(&self) -> Result<Vec<RecordId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT org, repo, number FROM snapshots ORDER BY org, repo, number")
            .context("prepare snapshot listing")?;

        let ids = stmt
            .query_map([], |row| {
                Ok(RecordId {
                    org: row.get(0)?,
                    repo: row.get(1)?,
                    number: row.get(2)?,
                })
            })
            .context("list snapshot identities")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read snapshot identity rows")?;

        Ok(ids)
    }

    /// Number of stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
            .context("count snapshots")?;
        Ok(count)
    }
}

pub(crate) fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
