//! Diagnostic logging setup.
//!
//! Progress and diagnostics go to stderr through `tracing`; reports meant for
//! the operator are written to stdout by the binary.

use std::env;
use std::io;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter, e.g. `debug` or
/// `kubestrap=trace`.
pub const LOG_ENV: &str = "KUBESTRAP_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber: an [`EnvFilter`] read from
/// [`LOG_ENV`], falling back to `RUST_LOG` and then `info`, and a compact
/// formatter writing to stderr.
///
/// # Errors
///
/// Returns [`TryInitError`] when a global subscriber is already installed.
pub fn init() -> Result<(), TryInitError> {
    let filter = build_filter(env::var(LOG_ENV).ok(), env::var("RUST_LOG").ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .try_init()
}

fn build_filter(primary: Option<String>, fallback: Option<String>) -> EnvFilter {
    [primary, fallback]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
