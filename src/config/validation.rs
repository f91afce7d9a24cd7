//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{FormBuddyError, Result};
use super::{Settings, SessionBackend};

/// Longest session lifetime accepted: 30 days
pub const MAX_SESSION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_session_config(&settings.session)?;
    validate_logging_config(&settings.logging)?;

    if let Some(ref database_config) = settings.database {
        validate_database_config(database_config)?;
    }

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(FormBuddyError::Config(
            "Bot token is required".to_string()
        ));
    }

    if let Some(username) = &config.username {
        if username.is_empty() || username.starts_with('@') {
            return Err(FormBuddyError::Config(
                "Bot username must be non-empty and given without '@'".to_string()
            ));
        }
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(FormBuddyError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(FormBuddyError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(FormBuddyError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate session store configuration
fn validate_session_config(config: &super::SessionConfig) -> Result<()> {
    if config.ttl_seconds == 0 {
        return Err(FormBuddyError::Config(
            "Session TTL must be greater than 0".to_string()
        ));
    }

    if config.ttl_seconds > MAX_SESSION_TTL_SECONDS {
        return Err(FormBuddyError::Config(format!(
            "Session TTL cannot exceed {} seconds",
            MAX_SESSION_TTL_SECONDS
        )));
    }

    if config.cleanup_interval_seconds == 0 {
        return Err(FormBuddyError::Config(
            "Session cleanup interval must be greater than 0".to_string()
        ));
    }

    if config.backend == SessionBackend::Redis && config.redis_url.is_empty() {
        return Err(FormBuddyError::Config(
            "Redis URL is required for the redis session backend".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(FormBuddyError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(FormBuddyError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    if config.directory.is_empty() {
        return Err(FormBuddyError::Config(
            "Log directory is required".to_string()
        ));
    }

    Ok(())
}
