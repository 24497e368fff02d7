//! Tracing subscriber setup for the `haccp` binary
//!
//! Events go to stderr so stdout stays clean for piping. The filter comes
//! from `HACCP_LOG`, then `RUST_LOG`, then the verbosity flags.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool, quiet: bool) {
    let _ = fmt()
        .with_env_filter(filter(verbose, quiet))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    for var in ["HACCP_LOG", "RUST_LOG"] {
        if let Ok(directives) = std::env::var(var) {
            if let Ok(filter) = EnvFilter::try_new(directives) {
                return filter;
            }
        }
    }
    EnvFilter::new(default_level(verbose, quiet))
}

fn default_level(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "haccp=debug"
    } else {
        "warn"
    }
}

/// Subscriber for unit tests, routed through the test harness
#[cfg(test)]
pub(crate) fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
