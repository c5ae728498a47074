//! Command application: translate, write to the target side, then commit
//! the new agreed state.
//!
//! The snapshot update and queue removal happen in one SQLite transaction,
//! and only after the adapter write succeeded. A crash between the write
//! and the commit leaves the command queued; re-running it writes the same
//! value again (no observable effect on the target) and then repairs the
//! snapshot.

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, error, warn};

use crate::adapter::{SideAdapter, SideError};
use crate::error::ErrorCode;
use crate::model::command::Command;
use crate::store::queue::CommandQueue;
use crate::store::snapshot::SnapshotStore;

/// What happened to one command during an apply pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Written to the target side; snapshot updated, command removed.
    Applied,
    /// Transient failure; command left queued for the next cycle.
    Retry,
    /// Permanent failure; command removed, snapshot untouched, surfaced
    /// to the operator.
    Rejected,
}

/// Apply one queued command against `adapter` (the target side).
///
/// # Errors
///
/// Returns an error only for store failures — adapter failures are
/// classified into the returned [`ApplyOutcome`], never propagated, so
/// one identity's failure cannot halt the cycle for others.
pub fn apply(
    conn: &mut Connection,
    adapter: &dyn SideAdapter,
    command: &Command,
) -> Result<ApplyOutcome> {
    debug_assert_eq!(adapter.side(), command.target);

    let snapshot = SnapshotStore::new(conn)
        .get(&command.id)
        .with_context(|| format!("load snapshot for {}", command.id))?;

    let Some(snapshot) = snapshot else {
        // A command without a snapshot can never be translated (no
        // addressing info). Drop it rather than retry forever.
        error!(
            id = %command.id,
            code = %ErrorCode::SnapshotMissing,
            "dropping command with no snapshot; {}",
            ErrorCode::SnapshotMissing.message()
        );
        CommandQueue::new(conn).remove(&command.id)?;
        return Ok(ApplyOutcome::Rejected);
    };

    match adapter.apply_patch(&snapshot, &command.payload) {
        Ok(()) => {
            let merged = command.payload.merged_into(&snapshot);
            let tx = conn
                .transaction()
                .context("begin snapshot/queue transaction")?;
            SnapshotStore::new(&tx).put(&merged)?;
            CommandQueue::new(&tx).remove(&command.id)?;
            tx.commit()
                .with_context(|| format!("commit applied command for {}", command.id))?;

            debug!(id = %command.id, target = %command.target, "command applied");
            Ok(ApplyOutcome::Applied)
        }
        Err(err @ SideError::Transient { .. }) => {
            warn!(
                id = %command.id,
                target = %command.target,
                "transient apply failure, will retry next cycle: {err}"
            );
            Ok(ApplyOutcome::Retry)
        }
        Err(err @ SideError::Permanent { .. }) => {
            error!(
                id = %command.id,
                target = %command.target,
                code = %ErrorCode::PatchRejected,
                "{}: {err}",
                ErrorCode::PatchRejected.message()
            );
            CommandQueue::new(conn).remove(&command.id)?;
            Ok(ApplyOutcome::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplyOutcome, apply};
    use crate::adapter::{Side, SideAdapter, SideError, TrackedScope};
    use crate::model::command::Command;
    use crate::model::patch::FieldPatch;
    use crate::model::record::{Record, RecordId, RecordState};
    use crate::store;
    use crate::store::queue::CommandQueue;
    use crate::store::snapshot::SnapshotStore;
    use std::cell::RefCell;

    /// Scripted fake target side: records applied patches, fails on demand.
    struct FakeTarget {
        side: Side,
        fail: Option<SideError>,
        applied: RefCell<Vec<(RecordId, FieldPatch)>>,
    }

    impl FakeTarget {
        fn succeeding(side: Side) -> Self {
            Self {
                side,
                fail: None,
                applied: RefCell::new(Vec::new()),
            }
        }

        fn failing(side: Side, err: SideError) -> Self {
            Self {
                side,
                fail: Some(err),
                applied: RefCell::new(Vec::new()),
            }
        }
    }

    impl SideAdapter for FakeTarget {
        fn side(&self) -> Side {
            self.side
        }

        fn fetch_all(&self, _scope: &TrackedScope) -> Result<Vec<Record>, SideError> {
            Ok(vec![])
        }

        fn apply_patch(&self, record: &Record, patch: &FieldPatch) -> Result<(), SideError> {
            if let Some(err) = &self.fail {
                return Err(match err {
                    SideError::Transient { side, message } => {
                        SideError::transient(*side, message.clone())
                    }
                    SideError::Permanent { side, message } => {
                        SideError::permanent(*side, message.clone())
                    }
                });
            }
            self.applied
                .borrow_mut()
                .push((record.id.clone(), patch.clone()));
            Ok(())
        }

        fn create(&self, record: &Record) -> Result<Record, SideError> {
            Ok(record.clone())
        }
    }

    fn snapshot_record() -> Record {
        Record {
            id: RecordId::new("acme", "widgets", 1),
            title: "Bug".to_string(),
            body: "x".to_string(),
            state: RecordState::Open,
            labels: vec![],
            source_url: "https://tracker.example/1".to_string(),
            api_url: "https://api.tracker.example/1".to_string(),
            mirror_page_id: "page-1".to_string(),
        }
    }

    fn close_command() -> Command {
        Command::new(
            RecordId::new("acme", "widgets", 1),
            Side::Mirror,
            FieldPatch {
                state: Some(RecordState::Closed),
                ..FieldPatch::default()
            },
            "state changed on tracker",
        )
    }

    #[test]
    fn successful_apply_updates_snapshot_and_clears_queue() {
        let mut conn = store::open_in_memory().unwrap();
        SnapshotStore::new(&conn).put(&snapshot_record()).unwrap();
        let cmd = close_command();
        CommandQueue::new(&conn).enqueue(&cmd).unwrap();

        let target = FakeTarget::succeeding(Side::Mirror);
        let outcome = apply(&mut conn, &target, &cmd).unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(target.applied.borrow().len(), 1);

        let snap = SnapshotStore::new(&conn).get(&cmd.id).unwrap().unwrap();
        assert_eq!(snap.state, RecordState::Closed);
        assert_eq!(snap.mirror_page_id, "page-1", "addressing round-trips");
        assert_eq!(CommandQueue::new(&conn).count().unwrap(), 0);
    }

    #[test]
    fn apply_is_idempotent_under_crash_and_retry() {
        let mut conn = store::open_in_memory().unwrap();
        SnapshotStore::new(&conn).put(&snapshot_record()).unwrap();
        let cmd = close_command();
        CommandQueue::new(&conn).enqueue(&cmd).unwrap();

        let target = FakeTarget::succeeding(Side::Mirror);
        apply(&mut conn, &target, &cmd).unwrap();
        let after_once = SnapshotStore::new(&conn).get(&cmd.id).unwrap();

        // Simulate the crash-and-retry path: the same command runs again.
        CommandQueue::new(&conn).enqueue(&cmd).unwrap();
        apply(&mut conn, &target, &cmd).unwrap();
        let after_twice = SnapshotStore::new(&conn).get(&cmd.id).unwrap();

        assert_eq!(after_once, after_twice);
        assert_eq!(CommandQueue::new(&conn).count().unwrap(), 0);
    }

    #[test]
    fn transient_failure_leaves_command_queued() {
        let mut conn = store::open_in_memory().unwrap();
        SnapshotStore::new(&conn).put(&snapshot_record()).unwrap();
        let cmd = close_command();
        CommandQueue::new(&conn).enqueue(&cmd).unwrap();

        let target =
            FakeTarget::failing(Side::Mirror, SideError::transient(Side::Mirror, "503"));
        let outcome = apply(&mut conn, &target, &cmd).unwrap();

        assert_eq!(outcome, ApplyOutcome::Retry);
        assert_eq!(CommandQueue::new(&conn).count().unwrap(), 1);

        let snap = SnapshotStore::new(&conn).get(&cmd.id).unwrap().unwrap();
        assert_eq!(snap.state, RecordState::Open, "snapshot untouched");
    }

    #[test]
    fn permanent_failure_drops_command_and_keeps_snapshot() {
        let mut conn = store::open_in_memory().unwrap();
        SnapshotStore::new(&conn).put(&snapshot_record()).unwrap();
        let cmd = close_command();
        CommandQueue::new(&conn).enqueue(&cmd).unwrap();

        let target =
            FakeTarget::failing(Side::Mirror, SideError::permanent(Side::Mirror, "404"));
        let outcome = apply(&mut conn, &target, &cmd).unwrap();

        assert_eq!(outcome, ApplyOutcome::Rejected);
        assert_eq!(CommandQueue::new(&conn).count().unwrap(), 0);

        let snap = SnapshotStore::new(&conn).get(&cmd.id).unwrap().unwrap();
        assert_eq!(snap.state, RecordState::Open, "snapshot untouched");
    }

    #[test]
    fn missing_snapshot_rejects_command() {
        let mut conn = store::open_in_memory().unwrap();
        let cmd = close_command();
        CommandQueue::new(&conn).enqueue(&cmd).unwrap();

        let target = FakeTarget::succeeding(Side::Mirror);
        let outcome = apply(&mut conn, &target, &cmd).unwrap();

        assert_eq!(outcome, ApplyOutcome::Rejected);
        assert_eq!(CommandQueue::new(&conn).count().unwrap(), 0);
        assert!(target.applied.borrow().is_empty(), "nothing was written");
    }
}
