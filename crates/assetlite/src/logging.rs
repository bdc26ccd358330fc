//! Logging setup for assetlite.
//!
//! Wires `tracing` to a `tracing-subscriber` registry. `RUST_LOG` overrides the
//! level picked from the command line.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above, including per-request traces.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::WARN,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Default `EnvFilter` directive for this verbosity.
    ///
    /// HTTP request spans from `tower_http` only show up from `Verbose` on.
    #[must_use]
    pub fn directive(&self) -> String {
        let level = self.to_level_filter();
        let http_level = match self {
            Self::Quiet | Self::Normal => Level::WARN,
            Self::Verbose | Self::Trace => level,
        };
        format!("assetlite={level},tower_http={http_level}")
    }
}

/// Initialize the logging system.
///
/// Call once at startup. Calling it again is harmless.
///
/// # Examples
///
/// ```no_run
/// use assetlite::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

/// Minimal logging for tests: warnings and errors through the test writer.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
