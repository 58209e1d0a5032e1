//! Tracing setup helpers.
//!
//! The engine itself only emits events; hosts decide where they go. These
//! helpers install a formatted subscriber for binaries and tests that have
//! no subscriber of their own.

use tracing_subscriber::EnvFilter;

/// Install a compact subscriber at the `info` level
///
/// Returns false when a global subscriber is already set, leaving it
/// in place. `RUST_LOG` overrides the default level.
pub fn init() -> bool {
    init_with_level("info")
}

/// Install a compact subscriber with a specific default level
pub fn init_with_level(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .is_ok()
}
