//! Tracing setup for hosts embedding the worker.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber from `RUST_LOG`, defaulting to `info`
/// for the workspace crates. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,localretrieve=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
