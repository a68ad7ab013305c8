//! Tracing initialization for the PixelForge MCP server.
//!
//! `RUST_LOG` takes precedence. Without it, the filter comes from the
//! configured `server.log_level`, which uses Python-style level names
//! (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`).
//!
//! Logs are written to stderr: with the stdio transport, stdout carries the
//! MCP protocol stream.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Map a configured log level name to a tracing filter directive.
///
/// Unknown names fall back to `info`.
///
/// # Example
///
/// ```
/// use pixelforge_mcp_common::tracing::level_directive;
///
/// assert_eq!(level_directive("WARNING"), "warn");
/// assert_eq!(level_directive("debug"), "debug");
/// assert_eq!(level_directive("verbose"), "info");
/// ```
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        "OFF" => "off",
        _ => "info",
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)))
}

/// Initialize the tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already set. Use [`try_init_tracing`]
/// where that can happen.
pub fn init_tracing(log_level: &str) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt_layer)
        .init();
}

/// Try to initialize tracing, returning `false` if a subscriber was already set.
pub fn try_init_tracing(log_level: &str) -> bool {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
