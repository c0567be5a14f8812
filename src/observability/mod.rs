//! Tracing initialization.
//!
//! Logs go to stderr so they never interleave with answers on stdout.
//! `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "arcana=debug" } else { "arcana=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
