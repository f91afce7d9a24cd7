//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging helpers
//! for the dialogue engine.

use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::{FormBuddyError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer when dropped, so the caller
/// must hold it for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.level)
            .map_err(|e| FormBuddyError::Config(format!("Invalid log filter: {}", e)))?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| FormBuddyError::Config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log a dialogue transition with structured data
pub fn log_dialogue_event(user_id: i64, form: &str, event: &str, step: Option<&str>) {
    info!(
        user_id = user_id,
        form = form,
        event = event,
        step = step,
        "Dialogue event"
    );
}

/// Log session store and sink operations
pub fn log_storage_operation(operation: &str, backend: &str, duration_ms: u64, success: bool) {
    if success {
        debug!(
            operation = operation,
            backend = backend,
            duration_ms = duration_ms,
            "Storage operation completed"
        );
    } else {
        error!(
            operation = operation,
            backend = backend,
            duration_ms = duration_ms,
            "Storage operation failed"
        );
    }
}
