use serde::{Deserialize, Serialize};

use super::patch::FieldPatch;
use super::record::RecordId;
use crate::adapter::Side;

/// A pending directional patch instruction.
///
/// Created by the drift detector, held durably in the command queue, and
/// consumed exactly once by the applier. At most one live command exists
/// per identity; a newer detection for the same identity replaces the
/// queued one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: RecordId,
    /// The side this patch must be written to (the side that did *not*
    /// change).
    pub target: Side,
    pub payload: FieldPatch,
    /// Short human-readable summary of what drifted, for logs and the
    /// queue listing.
    pub reason: String,
}

impl Command {
    pub fn new(id: RecordId, target: Side, payload: FieldPatch, reason: impl Into<String>) -> Self {
        Self {
            id,
            target,
            payload,
            reason: reason.into(),
        }
    }
}
