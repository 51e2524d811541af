//! Logging initialization
//!
//! Hosts that install their own subscriber can skip this entirely; everything in the
//! crate logs through `tracing`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "quorum_core=debug,info";

/// Install a `fmt` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` when set, then `fallback` (usually
/// [`CoreConfig::log_filter`](crate::config::CoreConfig::log_filter)), then
/// `quorum_core=debug,info`. Returns `false` when a global subscriber was already set.
pub fn init_logging(fallback: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
