//! Tracing subscriber setup for the rangefix binary.
//!
//! Filter priority, highest first: `RANGEFIX_LOG`, `RUST_LOG`, then the CLI
//! verbosity flags. Progress (info and debug) goes to stdout, warnings and errors
//! to stderr. When stdout carries machine-readable output everything goes to stderr.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;

/// Project-specific filter variable.
pub const LOG_ENV: &str = "RANGEFIX_LOG";

/// Verbosity derived from `-v`/`-q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Warnings and errors
    Normal,
    /// Per-file progress
    Verbose,
    /// Every rename, import and excision
    Debug,
}

impl Verbosity {
    /// `verbose` is the number of `-v` flags; verbose wins over quiet.
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        match verbose {
            0 if quiet => Self::Quiet,
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::Debug => Level::DEBUG,
        }
    }
}

/// Install the global subscriber. Call once, early in `main`.
///
/// With `stdout_reserved` set (JSON output), progress goes to stderr as well.
pub fn init_subscriber(verbosity: Verbosity, no_color: bool, stdout_reserved: bool) {
    let filter = build_env_filter(verbosity);
    let use_ansi = !no_color && std::io::IsTerminal::is_terminal(&std::io::stderr());

    if stdout_reserved {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(use_ansi)
            .with_target(false)
            .without_time();
        tracing_subscriber::registry().with(filter).with(layer).init();
    } else {
        let writer = std::io::stderr
            .with_max_level(Level::WARN)
            .or_else(std::io::stdout);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(use_ansi)
            .with_target(false)
            .without_time();
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    // An unparseable RANGEFIX_LOG falls through instead of failing
    if let Ok(directives) = std::env::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = verbosity.default_level();
    EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("warn"))
}
