//! The side adapter contract.
//!
//! The engine never talks to either side's HTTP API directly. Each side is
//! represented by an injected [`SideAdapter`] implementation that maps its
//! native read/write representation to and from [`Record`]. Adapters own
//! authentication, pagination, rate limits, and timeouts; the engine only
//! sees records and the transient/permanent split of [`SideError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::patch::FieldPatch;
use crate::model::record::Record;

/// The two sides being reconciled.
///
/// Side A is the upstream issue tracker, Side B the structured mirror
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Tracker,
    Mirror,
}

impl Side {
    /// The opposite side — the patch target for drift detected on `self`.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Tracker => Self::Mirror,
            Self::Mirror => Self::Tracker,
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Tracker => "tracker",
            Self::Mirror => "mirror",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tracker-side repositories are in scope for reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedScope {
    /// Tracker user whose personal repositories are tracked.
    pub user: String,
    /// Organizations whose repositories are tracked.
    pub orgs: Vec<String>,
}

/// Adapter failure, split by retry eligibility.
///
/// Transient failures (rate limit, network, 5xx-equivalent) leave queued
/// work in place to be retried next cycle. Permanent failures (bad
/// payload, auth, target deleted) can never succeed and are surfaced to
/// the operator instead of retried forever.
#[derive(Debug, Error)]
pub enum SideError {
    #[error("transient {side} failure: {message}")]
    Transient { side: Side, message: String },

    #[error("permanent {side} failure: {message}")]
    Permanent { side: Side, message: String },
}

impl SideError {
    pub fn transient(side: Side, message: impl Into<String>) -> Self {
        Self::Transient {
            side,
            message: message.into(),
        }
    }

    pub fn permanent(side: Side, message: impl Into<String>) -> Self {
        Self::Permanent {
            side,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Contract implemented once per side and consumed by the engine.
pub trait SideAdapter {
    /// Which side this adapter speaks for.
    fn side(&self) -> Side;

    /// Current records for every item in scope, normalized per the data
    /// model rules. A non-success upstream response must surface as an
    /// error, never a partially filled record.
    fn fetch_all(&self, scope: &TrackedScope) -> Result<Vec<Record>, SideError>;

    /// Write the set fields of `patch` to this side. `record` is the
    /// snapshot value and supplies addressing (`api_url` or
    /// `mirror_page_id`); its content fields are pre-patch state.
    ///
    /// One-shot and non-transactional: the whole patch succeeded or the
    /// whole patch failed as reported by status.
    fn apply_patch(&self, record: &Record, patch: &FieldPatch) -> Result<(), SideError>;

    /// Create `record` on this side, returning it with this side's
    /// addressing fields filled in.
    fn create(&self, record: &Record) -> Result<Record, SideError>;
}
