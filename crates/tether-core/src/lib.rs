//! tether-core: the reconciliation engine behind `tether`.
//!
//! Keeps two independently owned record stores — an upstream issue
//! tracker and a structured mirror database — eventually consistent under
//! polling. The engine owns the durable snapshot cache and command queue;
//! the two sides are injected as [`adapter::SideAdapter`] implementations.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` with context at the seams; typed
//!   [`adapter::SideError`] for the transient/permanent split.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod adapter;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

pub use adapter::{Side, SideAdapter, SideError, TrackedScope};
pub use engine::{CycleReport, Engine};
pub use model::{Command, FieldPatch, Record, RecordId, RecordState};
