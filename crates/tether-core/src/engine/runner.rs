//! Fixed-interval reconciliation loop.
//!
//! Single steady-state cycle, no terminal state: runs until the stop flag
//! is raised. The inter-cycle sleep is chunked so a stop request takes
//! effect within a fraction of a second without ever aborting an
//! in-flight apply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::{CycleReport, Engine};

/// Sleep slice between stop-flag checks.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Loop configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    /// Delay between cycles. Also the effective retry backoff for
    /// transient apply failures; must not be zero-delay tight-retry.
    pub interval: Duration,
    /// Run exactly one cycle, then return.
    pub once: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            once: false,
        }
    }
}

/// Drive the engine at a fixed interval until `stop` is raised.
///
/// Returns the report of the last completed cycle (if any ran).
///
/// # Errors
///
/// Returns an error only on store failures; adapter failures stay inside
/// the per-cycle reports.
pub fn run(
    engine: &mut Engine,
    options: &LoopOptions,
    stop: &AtomicBool,
) -> Result<Option<CycleReport>> {
    let mut last = None;

    while !stop.load(Ordering::Relaxed) {
        let report = engine.cycle(stop)?;
        last = Some(report);

        if options.once {
            break;
        }

        sleep_interruptibly(options.interval, stop);
    }

    info!("reconciliation loop stopped");
    Ok(last)
}

fn sleep_interruptibly(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
