//! Drift detection: compare a freshly fetched record against its snapshot.
//!
//! One symmetric detector serves both directions. The original system had
//! two near-duplicate compare-and-patch paths (one per direction); a
//! single detector plus a directional command makes the comparison logic
//! shared and the simultaneous-drift conflict case expressible.

use crate::model::patch::FieldPatch;
use crate::model::record::{Record, truncate_body};

/// Outcome of comparing a live record against the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Live value equals the snapshot; nothing to do.
    Unchanged,
    /// Content fields differ; the patch carries exactly the changed ones.
    Changed(FieldPatch),
    /// No snapshot exists — first time this identity is seen. Handled by
    /// the bootstrap collaborator, never turned into a command.
    FirstSeen,
}

/// Compare `live` against `snapshot` field-by-field over
/// `{title, body, state, labels}`.
///
/// Addressing fields are metadata, never compared. Both operands go
/// through the same normalization (body truncation, label sorting) so
/// pre- and post-truncated values compare equal; adapters normalize on
/// fetch, and the snapshot is normalized on write, but the detector does
/// not rely on either.
#[must_use]
pub fn detect(live: &Record, snapshot: Option<&Record>) -> Drift {
    let Some(snapshot) = snapshot else {
        return Drift::FirstSeen;
    };

    let mut patch = FieldPatch::default();

    if live.title != snapshot.title {
        patch.title = Some(live.title.clone());
    }

    let live_body = truncate_body(&live.body);
    if live_body != truncate_body(&snapshot.body) {
        patch.body = Some(live_body);
    }

    if live.state != snapshot.state {
        patch.state = Some(live.state);
    }

    let live_labels = sorted(&live.labels);
    if live_labels != sorted(&snapshot.labels) {
        patch.labels = Some(live_labels);
    }

    if patch.is_empty() {
        Drift::Unchanged
    } else {
        Drift::Changed(patch)
    }
}

fn sorted(labels: &[String]) -> Vec<String> {
    let mut labels = labels.to_vec();
    labels.sort();
    labels.dedup();
    labels
}

#[cfg(test)]
mod tests {
    use super::{Drift, detect};
    use crate::model::record::{BODY_LIMIT, Record, RecordId, RecordState};

    fn snapshot() -> Record {
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

    #[test]
    fn equal_records_produce_no_drift() {
        let snap = snapshot();
        assert_eq!(detect(&snap.clone(), Some(&snap)), Drift::Unchanged);
    }

    #[test]
    fn absent_snapshot_is_first_seen() {
        assert_eq!(detect(&snapshot(), None), Drift::FirstSeen);
    }

    #[test]
    fn state_change_yields_state_only_patch() {
        let snap = snapshot();
        let mut live = snap.clone();
        live.state = RecordState::Closed;

        let Drift::Changed(patch) = detect(&live, Some(&snap)) else {
            panic!("expected drift");
        };
        assert_eq!(patch.state, Some(RecordState::Closed));
        assert!(patch.title.is_none());
        assert!(patch.body.is_none());
        assert!(patch.labels.is_none());
        assert_eq!(patch.field_names(), ["state"]);
    }

    #[test]
    fn oversized_live_body_is_carried_truncated() {
        let snap = snapshot();
        let mut live = snap.clone();
        live.body = "b".repeat(3000);

        let Drift::Changed(patch) = detect(&live, Some(&snap)) else {
            panic!("expected drift");
        };
        assert_eq!(patch.body.as_ref().unwrap().chars().count(), BODY_LIMIT);
    }

    #[test]
    fn pre_truncated_body_equals_oversized_original() {
        // Snapshot holds the truncated value; live side still has the full
        // text. After shared truncation they must compare equal.
        let mut snap = snapshot();
        let full = "a".repeat(2500);
        snap.body = full.chars().take(BODY_LIMIT).collect();

        let mut live = snap.clone();
        live.body = full;

        assert_eq!(detect(&live, Some(&snap)), Drift::Unchanged);
    }

    #[test]
    fn label_order_does_not_count_as_drift() {
        let mut snap = snapshot();
        snap.labels = vec!["api".to_string(), "bug".to_string()];

        let mut live = snap.clone();
        live.labels = vec!["bug".to_string(), "api".to_string()];

        assert_eq!(detect(&live, Some(&snap)), Drift::Unchanged);
    }

    #[test]
    fn label_set_change_is_drift() {
        let snap = snapshot();
        let mut live = snap.clone();
        live.labels = vec!["urgent".to_string()];

        let Drift::Changed(patch) = detect(&live, Some(&snap)) else {
            panic!("expected drift");
        };
        assert_eq!(patch.labels, Some(vec!["urgent".to_string()]));
    }

    #[test]
    fn addressing_fields_are_never_compared() {
        let snap = snapshot();
        let mut live = snap.clone();
        live.source_url = "https://elsewhere.example".to_string();
        live.api_url = "https://api.elsewhere.example".to_string();
        live.mirror_page_id = String::new();

        assert_eq!(detect(&live, Some(&snap)), Drift::Unchanged);
    }

    #[test]
    fn multiple_changed_fields_all_carried() {
        let snap = snapshot();
        let mut live = snap.clone();
        live.title = "Worse bug".to_string();
        live.state = RecordState::Closed;

        let Drift::Changed(patch) = detect(&live, Some(&snap)) else {
            panic!("expected drift");
        };
        assert_eq!(patch.field_names(), ["title", "state"]);
    }
}
