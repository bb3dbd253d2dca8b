//! Subscriber installation for applications embedding compkit.
//!
//! The library itself only emits `tracing` events and spans.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::LoggingSettings;
use crate::infrastructure::error::{ToolkitError, ToolkitResult};

/// Build the `EnvFilter` described by `settings`.
///
/// `RUST_LOG`, when set, takes precedence over the configured directive.
pub fn env_filter(settings: &LoggingSettings) -> ToolkitResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.filter).map_err(|e| ToolkitError::Config {
        message: format!("logging.filter '{}': {}", settings.filter, e),
    })
}

/// Install a global fmt subscriber writing to stderr.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(settings: &LoggingSettings) -> ToolkitResult<()> {
    let span_events = if settings.span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(span_events);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter(settings)?))
        .try_init()
        .map_err(|e| ToolkitError::Config {
            message: format!("install subscriber: {e}"),
        })?;

    tracing::debug!(filter = %settings.filter, "logging initialized");
    Ok(())
}
