use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Maximum body length, in characters, accepted by the mirror side.
///
/// Bodies are truncated to this limit on every write in either direction.
/// Truncation is lossy and not reversible; both comparison operands go
/// through it so pre- and post-truncated values compare equal.
pub const BODY_LIMIT: usize = 2000;

/// Composite identity of a synchronizable item.
///
/// Immutable after creation and unique across the whole system. The triple
/// comes from the tracker side: the organization (or user) owning the
/// repository, the repository name, and the item number within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    pub org: String,
    pub repo: String,
    pub number: u64,
}

impl RecordId {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

/// The two lifecycle states a tracked item can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Open,
    Closed,
}

impl RecordState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a state value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError {
    pub got: String,
}

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state: '{}'", self.got)
    }
}

impl std::error::Error for ParseStateError {}

impl FromStr for RecordState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseStateError { got: s.to_string() }),
        }
    }
}

/// Canonical in-memory shape of one synchronizable item, independent of
/// either side's wire format.
///
/// Content fields (`title`, `body`, `state`, `labels`) participate in drift
/// detection. Addressing fields (`source_url`, `api_url`, `mirror_page_id`)
/// are metadata carried through unchanged; they are never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    pub state: RecordState,
    pub labels: Vec<String>,
    /// Tracker-side human URL (`html_url` on the wire).
    pub source_url: String,
    /// Tracker-side API endpoint used for patching.
    pub api_url: String,
    /// Mirror-side page id. Empty until the item has been created on the
    /// mirror at least once, then set exactly once and immutable.
    pub mirror_page_id: String,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            id: RecordId::new("", "", 0),
            title: String::new(),
            body: String::new(),
            state: RecordState::Open,
            labels: Vec::new(),
            source_url: String::new(),
            api_url: String::new(),
            mirror_page_id: String::new(),
        }
    }
}

impl Record {
    /// Normalize content fields in place: truncate the body to
    /// [`BODY_LIMIT`], sort and deduplicate labels.
    ///
    /// Adapters call this after mapping wire data, and the drift detector
    /// relies on both operands having been through it.
    pub fn normalize(&mut self) {
        self.body = truncate_body(&self.body);
        normalize_labels(&mut self.labels);
    }

    /// Consuming variant of [`Record::normalize`] for builder-style call
    /// sites.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// Truncate a body to [`BODY_LIMIT`] characters.
///
/// Operates on `char` boundaries, never bytes: a multi-byte character at
/// the limit is dropped whole rather than split. Idempotent —
/// `truncate_body(truncate_body(b)) == truncate_body(b)` for all `b`.
#[must_use]
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(BODY_LIMIT) {
        Some((byte_idx, _)) => body[..byte_idx].to_string(),
        None => body.to_string(),
    }
}

/// Sort and deduplicate a label set in place.
///
/// Labels are an unordered set on both sides; a stable sorted order makes
/// equality comparison and serialization deterministic.
pub fn normalize_labels(labels: &mut Vec<String>) {
    labels.sort();
    labels.dedup();
}
