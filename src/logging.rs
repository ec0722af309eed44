//! Logging setup for polysql.
//!
//! Every crate in the workspace logs through `tracing`. Nothing is printed
//! unless a subscriber is installed, either by the application or by
//! [`init`] (requires the `tracing-subscriber` feature).
//!
//! # Environment Variables
//!
//! - `POLYSQL_DEBUG=true` (or `1`, `yes`) - Enable debug logging
//! - `POLYSQL_LOG_LEVEL=debug|info|warn|error|trace` - Set a specific log level
//! - `POLYSQL_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use polysql::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//!
//! // Or with a specific level
//! logging::init_with_level("trace");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `POLYSQL_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("POLYSQL_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `POLYSQL_LOG_LEVEL`.
///
/// Defaults to "debug" if `POLYSQL_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("POLYSQL_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `POLYSQL_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("POLYSQL_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Filter directive covering every polysql crate at `level`.
pub fn filter_directive(level: &str) -> String {
    ["polysql", "polysql_core", "polysql_postgres", "polysql_sqlite"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the polysql logging system.
///
/// Subsequent calls are no-ops. Does nothing unless `POLYSQL_DEBUG` or
/// `POLYSQL_LOG_LEVEL` is set.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("POLYSQL_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(filter_directive(level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(
                    level = level,
                    format = get_log_format(),
                    "polysql logging initialized"
                );
            }
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: only called at program startup before threads are spawned.
    unsafe {
        env::set_var("POLYSQL_LOG_LEVEL", level);
    }
    init();
}

/// Initialize debug logging; equivalent to `POLYSQL_DEBUG=true` plus [`init`].
///
/// # Safety
///
/// Same constraints as [`init_with_level`].
pub fn init_debug() {
    // SAFETY: only called at program startup before threads are spawned.
    unsafe {
        env::set_var("POLYSQL_DEBUG", "true");
    }
    init();
}
