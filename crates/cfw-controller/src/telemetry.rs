//! # Logging Setup
//!
//! Installs the global `tracing` subscriber for the binary. Library code only
//! emits events; embedding applications bring their own subscriber.

use crate::config::ControllerConfig;
use crate::errors::TelemetryError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the filter for `config.log_level`.
///
/// # Errors
///
/// `InvalidFilter` if the directive does not parse.
pub fn env_filter(config: &ControllerConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::InvalidFilter {
        filter: config.log_level.clone(),
        reason: e.to_string(),
    })
}

/// Installs a fmt subscriber filtered by `config.log_level`.
///
/// # Errors
///
/// `InvalidFilter` for a bad directive, `SubscriberInit` if a global
/// subscriber is already set.
pub fn init_logging(config: &ControllerConfig) -> Result<(), TelemetryError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::debug!(filter = %config.log_level, "logging initialized");
    Ok(())
}
