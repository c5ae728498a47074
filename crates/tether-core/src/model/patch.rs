use serde::{Deserialize, Serialize};

use super::record::{Record, RecordState, normalize_labels, truncate_body};

/// The subset of content fields a directional patch carries.
///
/// Only fields that actually drifted are set; adapters translate the set
/// fields into their side's native patch shape and send nothing else.
/// Addressing fields never appear here — they are supplied from the
/// snapshot at apply time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<RecordState>,
    pub labels: Option<Vec<String>>,
}

impl FieldPatch {
    /// True when no field is set, i.e. no drift was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.state.is_none() && self.labels.is_none()
    }

    /// Names of the set fields, for log lines and command reasons.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.body.is_some() {
            names.push("body");
        }
        if self.state.is_some() {
            names.push("state");
        }
        if self.labels.is_some() {
            names.push("labels");
        }
        names
    }

    /// Normalize carried values the same way [`Record::normalize`] does,
    /// so a patch built from un-normalized input still compares and
    /// applies cleanly.
    pub fn normalize(&mut self) {
        if let Some(body) = &self.body {
            self.body = Some(truncate_body(body));
        }
        if let Some(labels) = &mut self.labels {
            normalize_labels(labels);
        }
    }

    /// Overlay the set fields onto `record`, producing the post-apply
    /// value the snapshot should hold once the target side acknowledged
    /// the patch.
    #[must_use]
    pub fn merged_into(&self, record: &Record) -> Record {
        let mut merged = record.clone();
        if let Some(title) = &self.title {
            merged.title = title.clone();
        }
        if let Some(body) = &self.body {
            merged.body = body.clone();
        }
        if let Some(state) = self.state {
            merged.state = state;
        }
        if let Some(labels) = &self.labels {
            merged.labels = labels.clone();
        }
        merged.normalize();
        merged
    }
}
