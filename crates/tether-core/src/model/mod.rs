//! Canonical data model: records, field patches, and commands.

pub mod command;
pub mod patch;
pub mod record;

pub use command::Command;
pub use patch::FieldPatch;
pub use record::{BODY_LIMIT, Record, RecordId, RecordState, truncate_body};
