//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::cli_args::Verbosity;

/// Filter directive for a verbosity level.
///
/// `RUST_LOG` takes precedence when set.
pub fn filter_directive(verbosity: Verbosity) -> String {
    format!(
        "river_core={level},river_cli={level}",
        level = verbosity.as_str()
    )
}

/// Installs the global fmt subscriber. Safe to call more than once.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
