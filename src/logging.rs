//! Diagnostic output on stderr. Stdout is reserved for generated manifests and listings.

use std::io;

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Maximum [`Level`] of events shown for the number of `-v` flags given.
pub const fn level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber which writes events at or below [`level()`] to stderr.
pub fn init(verbosity: u8) {
    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level(verbosity)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}
