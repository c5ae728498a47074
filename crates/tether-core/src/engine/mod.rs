//! The reconciliation engine: one cycle of fetch → detect → enqueue →
//! apply, plus the report it produces.
//!
//! Both side adapters are injected, so the engine is testable against
//! fakes. All shared mutable state per identity lives in the engine-owned
//! store (its snapshot row and its queue slot); adapters only exchange
//! records.

pub mod applier;
pub mod drift;
pub mod runner;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapter::{Side, SideAdapter, TrackedScope};
use crate::error::ErrorCode;
use crate::model::command::Command;
use crate::model::patch::FieldPatch;
use crate::model::record::{Record, RecordId};
use crate::store::queue::CommandQueue;
use crate::store::snapshot::SnapshotStore;

use applier::ApplyOutcome;
use drift::Drift;

/// Counters and non-fatal errors from one reconciliation cycle.
#[derive(Debug, Default, Serialize)]
pub struct CycleReport {
    /// Whether each side's fetch succeeded.
    pub tracker_fetch_ok: bool,
    pub mirror_fetch_ok: bool,
    /// Records fetched per side.
    pub tracker_records: usize,
    pub mirror_records: usize,
    /// Commands enqueued this cycle.
    pub enqueued: usize,
    /// Identities where both sides drifted from the snapshot.
    pub conflicts: usize,
    /// Identities where both sides had already converged on the same
    /// value and only the snapshot needed rewriting.
    pub repaired: usize,
    /// Identities seen with no snapshot (need bootstrap import).
    pub first_seen: usize,
    /// Snapshotted identities absent from a side that fetched fine.
    pub missing: usize,
    /// Apply outcomes.
    pub applied: usize,
    pub retried: usize,
    pub rejected: usize,
    /// Non-fatal errors collected during the run.
    pub errors: Vec<String>,
}

/// Live records for one identity, per side. `None` means the identity was
/// absent from that side's (successful) fetch.
#[derive(Debug, Default)]
struct SidePair {
    tracker: Option<Record>,
    mirror: Option<Record>,
}

/// The reconciliation engine. Owns the durable store; borrows nothing
/// from the adapters beyond the [`SideAdapter`] contract.
pub struct Engine {
    conn: Connection,
    tracker: Box<dyn SideAdapter>,
    mirror: Box<dyn SideAdapter>,
    scope: TrackedScope,
}

impl Engine {
    pub fn new(
        conn: Connection,
        tracker: Box<dyn SideAdapter>,
        mirror: Box<dyn SideAdapter>,
        scope: TrackedScope,
    ) -> Self {
        Self {
            conn,
            tracker,
            mirror,
            scope,
        }
    }

    /// Run one full cycle: fetch both sides, detect drift in both
    /// directions, enqueue commands, then apply everything pending.
    ///
    /// `stop` is checked between apply operations; an in-flight apply
    /// always completes so a write is never abandoned after it reached
    /// the target side.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures. Adapter failures are
    /// collected into the report — one identity's failure never halts
    /// the cycle for others.
    pub fn cycle(&mut self, stop: &AtomicBool) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let tracker_live = self.fetch_side(Side::Tracker, &mut report);
        let mirror_live = self.fetch_side(Side::Mirror, &mut report);

        self.detect_and_enqueue(tracker_live, mirror_live, &mut report)?;
        self.apply_pending(stop, &mut report)?;

        info!(
            enqueued = report.enqueued,
            applied = report.applied,
            retried = report.retried,
            rejected = report.rejected,
            conflicts = report.conflicts,
            repaired = report.repaired,
            first_seen = report.first_seen,
            missing = report.missing,
            "cycle complete"
        );
        Ok(report)
    }

    /// Fetch one side. `None` means the fetch failed and this side must
    /// be skipped for detection this cycle (prior snapshot and queue
    /// state untouched).
    fn fetch_side(&self, side: Side, report: &mut CycleReport) -> Option<Vec<Record>> {
        let adapter = self.adapter_for(side);
        match adapter.fetch_all(&self.scope) {
            Ok(records) => {
                debug!(side = %side, count = records.len(), "fetched records");
                match side {
                    Side::Tracker => {
                        report.tracker_fetch_ok = true;
                        report.tracker_records = records.len();
                    }
                    Side::Mirror => {
                        report.mirror_fetch_ok = true;
                        report.mirror_records = records.len();
                    }
                }
                Some(records)
            }
            Err(err) => {
                warn!(
                    side = %side,
                    code = %ErrorCode::SideUnreachable,
                    "fetch failed, skipping this side for the cycle: {err}"
                );
                report.errors.push(format!("fetch {side}: {err}"));
                None
            }
        }
    }

    fn detect_and_enqueue(
        &self,
        tracker_live: Option<Vec<Record>>,
        mirror_live: Option<Vec<Record>>,
        report: &mut CycleReport,
    ) -> Result<()> {
        let tracker_ok = tracker_live.is_some();
        let mirror_ok = mirror_live.is_some();

        let mut pairs: BTreeMap<RecordId, SidePair> = BTreeMap::new();
        for record in tracker_live.into_iter().flatten() {
            let id = record.id.clone();
            pairs.entry(id).or_default().tracker = Some(record.normalized());
        }
        for record in mirror_live.into_iter().flatten() {
            let id = record.id.clone();
            pairs.entry(id).or_default().mirror = Some(record.normalized());
        }

        let snapshots = SnapshotStore::new(&self.conn);
        let queue = CommandQueue::new(&self.conn);

        // Snapshotted identities absent from both fetches still need a
        // missing-item check.
        for id in snapshots.list_ids()? {
            pairs.entry(id).or_default();
        }

        for (id, pair) in pairs {
            let snapshot = snapshots.get(&id)?;

            if snapshot.is_none() {
                if pair.tracker.is_some() || pair.mirror.is_some() {
                    debug!(id = %id, "first seen, waiting for bootstrap import");
                    report.first_seen += 1;
                }
                continue;
            }

            if tracker_ok && pair.tracker.is_none() {
                warn!(id = %id, "snapshotted item missing from tracker fetch");
                report.missing += 1;
            }
            if mirror_ok && pair.mirror.is_none() {
                warn!(id = %id, "snapshotted item missing from mirror fetch");
                report.missing += 1;
            }

            let tracker_drift = pair
                .tracker
                .as_ref()
                .map_or(Drift::Unchanged, |live| drift::detect(live, snapshot.as_ref()));
            let mirror_drift = pair
                .mirror
                .as_ref()
                .map_or(Drift::Unchanged, |live| drift::detect(live, snapshot.as_ref()));

            let converged = match (&pair.tracker, &pair.mirror) {
                (Some(t), Some(m)) => content_eq(t, m),
                _ => false,
            };

            match (tracker_drift, mirror_drift) {
                (Drift::Changed(_), Drift::Changed(_)) if converged => {
                    // Both sides drifted to the *same* value — the classic
                    // crash-between-apply-and-snapshot-update case. The
                    // sides already agree; repair the snapshot and drop any
                    // stale queued command.
                    debug!(id = %id, "sides converged ahead of snapshot, repairing");
                    if let Some(live) = pair.tracker.as_ref() {
                        let mut repaired = live.clone();
                        // Keep the snapshot's addressing; live tracker data
                        // has no mirror page id.
                        if let Some(snap) = &snapshot {
                            repaired.mirror_page_id.clone_from(&snap.mirror_page_id);
                        }
                        snapshots.put(&repaired)?;
                    }
                    queue.remove(&id)?;
                    report.repaired += 1;
                }
                (Drift::Changed(_), Drift::Changed(_)) => {
                    // True conflict: both sides drifted from the agreed
                    // state in the same cycle. Neither direction may be
                    // applied; an earlier queued command for this identity
                    // is stale now, so drop it too.
                    warn!(
                        id = %id,
                        code = %ErrorCode::ConflictDetected,
                        "{}; resolve manually",
                        ErrorCode::ConflictDetected.message()
                    );
                    queue.remove(&id)?;
                    report.conflicts += 1;
                }
                (Drift::Changed(patch), _) => {
                    self.enqueue_drift(&queue, id, Side::Tracker, patch, report)?;
                }
                (_, Drift::Changed(patch)) => {
                    self.enqueue_drift(&queue, id, Side::Mirror, patch, report)?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn enqueue_drift(
        &self,
        queue: &CommandQueue<'_>,
        id: RecordId,
        source: Side,
        patch: FieldPatch,
        report: &mut CycleReport,
    ) -> Result<()> {
        let reason = format!("{} changed on {source}", patch.field_names().join(", "));
        debug!(id = %id, target = %source.other(), reason = %reason, "drift detected");
        queue
            .enqueue(&Command::new(id, source.other(), patch, reason))
            .context("enqueue detected drift")?;
        report.enqueued += 1;
        Ok(())
    }

    fn apply_pending(&mut self, stop: &AtomicBool, report: &mut CycleReport) -> Result<()> {
        let pending = CommandQueue::new(&self.conn).dequeue_all()?;

        for command in pending {
            if stop.load(Ordering::Relaxed) {
                debug!("stop requested, leaving remaining commands queued");
                break;
            }

            let adapter = match command.target {
                Side::Tracker => self.tracker.as_ref(),
                Side::Mirror => self.mirror.as_ref(),
            };
            match applier::apply(&mut self.conn, adapter, &command)? {
                ApplyOutcome::Applied => report.applied += 1,
                ApplyOutcome::Retry => report.retried += 1,
                ApplyOutcome::Rejected => report.rejected += 1,
            }
        }

        Ok(())
    }

    fn adapter_for(&self, side: Side) -> &dyn SideAdapter {
        match side {
            Side::Tracker => self.tracker.as_ref(),
            Side::Mirror => self.mirror.as_ref(),
        }
    }

    /// Access the underlying store connection (bootstrap and status use
    /// this; adapters never do).
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Content-field equality between two already-normalized records.
/// Addressing fields are intentionally excluded.
fn content_eq(a: &Record, b: &Record) -> bool {
    a.title == b.title && a.body == b.body && a.state == b.state && a.labels == b.labels
}
