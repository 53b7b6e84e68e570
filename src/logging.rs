//! Logging init: structured diagnostics to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Without `RUST_LOG`, only warnings are
/// shown so the progress line stays readable; `verbose` adds this crate's
/// debug output.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "warn,rangedl=debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
