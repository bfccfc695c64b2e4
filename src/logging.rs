//! Logging init: plain messages on stderr, filtered by verbosity.

use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level; `RUST_LOG` wins over this.
pub fn default_directive(verbosity: u8, silent: bool) -> &'static str {
    match (silent, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "info,shot_scraper_lib=debug",
        (false, _) => "debug",
    }
}

/// Initialize logging to stderr. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(verbosity: u8, silent: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity, silent)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .without_time()
        .with_level(verbosity > 0)
        .try_init();
}
