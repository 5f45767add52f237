//! Structured tracing helpers.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "TOOLHUB_LOG";

/// Installs a stderr `fmt` subscriber.
///
/// The filter is read from `TOOLHUB_LOG`, then `RUST_LOG`, defaulting to
/// `info`. Stdout stays free for command output. Calling this more than once
/// is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
