//! Concrete side adapters: thin blocking HTTP wrappers over each side's
//! native API, mapping wire shapes to and from [`tether_core::Record`].
//!
//! The engine never sees any of this — it consumes the
//! [`tether_core::SideAdapter`] contract only.

pub mod mirror;
pub mod tracker;

use std::time::Duration;

use tether_core::adapter::{Side, SideError};

/// Build the shared blocking HTTP agent with a per-call timeout.
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a ureq failure into the engine's transient/permanent split.
///
/// Rate limiting, server errors, and transport failures are retried next
/// cycle; everything else (auth, bad payload, missing target) can never
/// succeed and is surfaced instead.
pub fn classify(side: Side, err: ureq::Error) -> SideError {
    match err {
        ureq::Error::Status(code, response) => {
            let message = format!("HTTP {code} from {}", response.get_url());
            if code == 408 || code == 429 || code >= 500 {
                SideError::transient(side, message)
            } else {
                SideError::permanent(side, message)
            }
        }
        ureq::Error::Transport(transport) => {
            SideError::transient(side, format!("transport: {transport}"))
        }
    }
}

/// Map a response-body decode failure; the status line was already 2xx,
/// so a garbled body is most likely an intermediary problem.
pub fn decode_error(side: Side, err: &std::io::Error) -> SideError {
    SideError::transient(side, format!("decode response body: {err}"))
}
