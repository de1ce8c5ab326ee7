//! Diagnostic logging for the CLI.
//!
//! Logs go to stderr so they never mix with the tox output relayed on stdout.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter directive.
pub const LOG_ENV_VAR: &str = "RTOX_LOG";

const DEFAULT_FILTER: &str = "info";

/// Builds the filter from [`LOG_ENV_VAR`], falling back to `info` when the
/// variable is unset or unparsable.
#[must_use]
pub fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init() {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if tracing_subscriber::registry()
        .with(filter())
        .with(layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}
