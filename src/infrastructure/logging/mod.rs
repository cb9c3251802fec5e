//! Logging setup.
//!
//! Structured logging through tracing-subscriber; level controlled by
//! `RUST_LOG`, defaulting to warnings so CLI output stays clean.

use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber. Safe to call once from `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hivemind=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
