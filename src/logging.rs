//! Tracing subscriber setup.
//!
//! Log events go to stderr so stdout carries only command output (answers,
//! JSON). The filter comes from `BRIEF_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "BRIEF_LOG";

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
