//! Log subscriber setup for the `librarian` command.
//!
//! The CLI calls [`init_tracing`] once, before the run span is opened, with
//! `--json` and the level implied by `--verbose`. Log lines go to stderr so
//! that the command summary printed on stdout stays machine readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives for Librarian only; takes precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "LIBRARIAN_LOG";

/// Filter from `LIBRARIAN_LOG`, else `RUST_LOG`, else `level`.
///
/// A variable that is set but fails to parse is skipped.
pub fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber; only the first call in a process has any
/// effect.
pub fn init_tracing(json: bool, level: Level) {
    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(log_filter(level))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}
