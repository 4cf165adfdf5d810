//! Log output for binaries and tools built on the pipeline.

use tracing_subscriber::EnvFilter;

/// Variable read for filter directives, e.g. `MESHTAP_LOG=meshtap=debug`.
pub const LOG_ENV: &str = "MESHTAP_LOG";

/// Install a fmt subscriber filtered by `MESHTAP_LOG`, or by
/// `default_directive` when the variable is unset or invalid.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
