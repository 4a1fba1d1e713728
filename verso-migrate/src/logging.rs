//! Logging setup for migration runs.
//!
//! The engine emits `tracing` events on its own. This module only installs a
//! subscriber for binaries that have none, driven by environment variables:
//!
//! - `VERSO_DEBUG=true|1|yes` - log at `debug`
//! - `VERSO_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `VERSO_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! use verso_migrate::logging;
//!
//! logging::init();
//! ```
//!
//! Installing the subscriber requires the `tracing-subscriber` feature. Without
//! it, [`init`] is a no-op and events go to whatever subscriber the
//! application installs.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "VERSO_DEBUG";
const LEVEL_VAR: &str = "VERSO_LOG_LEVEL";
const FORMAT_VAR: &str = "VERSO_LOG_FORMAT";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single-line, human readable.
    Compact,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("pretty") => Self::Pretty,
            Some("compact") => Self::Compact,
            _ => Self::Json,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

fn truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn resolve_level(level: Option<&str>, debug: bool) -> &'static str {
    match level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ if debug => "debug",
        _ => "warn",
    }
}

/// Whether `VERSO_DEBUG` is set to a true value.
#[inline]
pub fn is_debug_enabled() -> bool {
    truthy(env::var(DEBUG_VAR).ok().as_deref())
}

/// Level from `VERSO_LOG_LEVEL`, falling back to `debug` when
/// `VERSO_DEBUG` is set and `warn` otherwise.
pub fn log_level() -> &'static str {
    resolve_level(env::var(LEVEL_VAR).ok().as_deref(), is_debug_enabled())
}

/// Format from `VERSO_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    LogFormat::parse(env::var(FORMAT_VAR).ok().as_deref())
}

#[cfg_attr(not(feature = "tracing-subscriber"), allow(dead_code))]
fn filter_directives(level: &str) -> String {
    ["verso", "verso_migrate", "verso_sqlite", "verso_postgres"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber once.
///
/// Does nothing unless `VERSO_DEBUG` or `VERSO_LOG_LEVEL` is set. Later calls
/// are no-ops.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var(LEVEL_VAR).is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = log_level();
            let format = log_format();
            let filter = EnvFilter::try_new(filter_directives(level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(log_level = level, format = format.as_str(), "Verso logging initialized");
            }
        }
    });
}

/// Set `VERSO_LOG_LEVEL` and call [`init`].
///
/// # Safety
///
/// Modifies the process environment. Call it at startup before spawning
/// threads.
pub fn init_with_level(level: &str) {
    // SAFETY: documented as startup-only, before other threads exist.
    unsafe {
        env::set_var(LEVEL_VAR, level);
    }
    init();
}
