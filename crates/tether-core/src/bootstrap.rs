//! Initial import: seed the mirror and the snapshot cache from the
//! tracker.
//!
//! This is the collaborator the drift detector delegates "first seen"
//! identities to. It never goes through the command queue: creation is a
//! one-shot bulk operation, not a reconciliation patch.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapter::{SideAdapter, TrackedScope};
use crate::store::snapshot::SnapshotStore;

/// Counters from one import run.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    /// Records fetched from the tracker scope.
    pub fetched: usize,
    /// Pages created on the mirror.
    pub created: usize,
    /// Snapshots written (created pages plus repairs for snapshot-less
    /// items that already carried a mirror page id).
    pub seeded: usize,
    /// Identities that already had a snapshot.
    pub skipped: usize,
    /// Per-identity failures; the run continues past them.
    pub errors: Vec<String>,
}

/// Fetch every tracker record in scope, create missing mirror pages, and
/// seed snapshots.
///
/// Idempotent: identities that already have a snapshot are skipped, so an
/// interrupted import can simply be re-run.
///
/// # Errors
///
/// Returns an error if the tracker fetch or the store fails. Per-record
/// mirror failures are collected into the report instead.
pub fn seed(
    conn: &rusqlite::Connection,
    tracker: &dyn SideAdapter,
    mirror: &dyn SideAdapter,
    scope: &TrackedScope,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let snapshots = SnapshotStore::new(conn);

    let records = tracker
        .fetch_all(scope)
        .map_err(|err| anyhow::anyhow!("fetch tracker scope: {err}"))?;
    report.fetched = records.len();

    for record in records {
        let record = record.normalized();

        if snapshots.has(&record.id)? {
            debug!(id = %record.id, "already reconciled, skipping");
            report.skipped += 1;
            continue;
        }

        let seeded = if record.mirror_page_id.is_empty() {
            match mirror.create(&record) {
                Ok(created) => {
                    report.created += 1;
                    created.normalized()
                }
                Err(err) => {
                    warn!(id = %record.id, "mirror create failed: {err}");
                    report.errors.push(format!("{}: {err}", record.id));
                    continue;
                }
            }
        } else {
            // Page exists but the snapshot is gone (e.g. a wiped store);
            // re-seed from the tracker value without creating a duplicate.
            record
        };

        snapshots.put(&seeded)?;
        report.seeded += 1;
    }

    info!(
        fetched = report.fetched,
        created = report.created,
        seeded = report.seeded,
        skipped = report.skipped,
        "import complete"
    );
    Ok(report)
}
