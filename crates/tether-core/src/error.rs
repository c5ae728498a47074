use std::fmt;

/// Machine-readable error codes for operator-facing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    StoreCorrupt,
    SnapshotMissing,
    SideUnreachable,
    PatchRejected,
    ConflictDetected,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::StoreCorrupt => "E2001",
            Self::SnapshotMissing => "E2002",
            Self::SideUnreachable => "E3001",
            Self::PatchRejected => "E3002",
            Self::ConflictDetected => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Sync store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::StoreCorrupt => "Corrupt snapshot/queue store",
            Self::SnapshotMissing => "Snapshot missing for queued command",
            Self::SideUnreachable => "Side unreachable",
            Self::PatchRejected => "Patch permanently rejected by target side",
            Self::ConflictDetected => "Both sides drifted for the same item",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tether init` in this directory first."),
            Self::ConfigParseError => Some("Fix syntax in .tether/config.toml and retry."),
            Self::StoreCorrupt => {
                Some("Delete .tether/sync.db and re-run `tether import` to reseed.")
            }
            Self::SnapshotMissing => Some("Re-run `tether import` to reseed the missing item."),
            Self::SideUnreachable => {
                Some("Check network access and the API token environment variables.")
            }
            Self::PatchRejected => {
                Some("Reconcile the item manually; the command has been dropped.")
            }
            Self::ConflictDetected => {
                Some("Edit one side to match the other; the next cycle will propagate it.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
