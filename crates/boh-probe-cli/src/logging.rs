//! Diagnostic logging setup

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, else from the verbosity flags
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()))
}

/// Install the global subscriber, writing compact lines to stderr.
///
/// A second call is a no-op.
pub fn init_logging(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(verbosity.is_verbose())
        .compact()
        .try_init();
}
