//! # Logging Setup
//!
//! Initializes the global `tracing` subscriber once at process start. Level
//! is controlled by `RUST_LOG`, defaulting to `info` so a plain `cargo run`
//! is not silent.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Safe to call once; a second call is a
/// programmer error in the caller and is ignored rather than panicking, since
/// it only matters in tests that may initialize logging more than once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
