#![deny(missing_docs)]
//! Shared logging utilities for the scraper workspace.
//!
//! Every crate logs through the `scrape_*` macros so that all scraper output
//! shares one `log` target, which the binary can filter on independently of
//! chatty dependencies such as `reqwest` or `hyper`.

/// Log target used by every `scrape_*` macro.
pub const TARGET: &str = "scraper";

/// Logs a trace-level message under the scraper target.
#[macro_export]
macro_rules! scrape_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under the scraper target.
#[macro_export]
macro_rules! scrape_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under the scraper target.
#[macro_export]
macro_rules! scrape_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under the scraper target.
#[macro_export]
macro_rules! scrape_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under the scraper target.
#[macro_export]
macro_rules! scrape_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Shortens an opaque key (cache key, token) for log output.
pub fn abbreviate(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(12)
        .map(|(idx, _)| idx)
        .unwrap_or(key.len());
    &key[..end]
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let config = ConfigBuilder::new()
        .add_filter_allow_str(TARGET)
        .build();

    // Another test in the same binary may have installed the logger already.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
