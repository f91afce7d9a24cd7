//! Error handling for FormBuddy
//!
//! This module defines the main error type used throughout the application
//! and classifies errors by recoverability and severity.

use thiserror::Error;

/// Main error type for FormBuddy application
#[derive(Error, Debug)]
pub enum FormBuddyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Session already exists for user {user_id}")]
    SessionAlreadyExists { user_id: i64 },

    #[error("No session for user {user_id}")]
    SessionNotFound { user_id: i64 },

    #[error("Unknown form: {0}")]
    UnknownForm(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for FormBuddy operations
pub type Result<T> = std::result::Result<T, FormBuddyError>;

impl FormBuddyError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            FormBuddyError::Database(_) => true,
            FormBuddyError::Migration(_) => false,
            FormBuddyError::Telegram(_) => true,
            FormBuddyError::Redis(_) => true,
            FormBuddyError::Config(_) => false,
            FormBuddyError::ConfigLoad(_) => false,
            FormBuddyError::SessionAlreadyExists { .. } => true,
            FormBuddyError::SessionNotFound { .. } => true,
            FormBuddyError::UnknownForm(_) => false,
            FormBuddyError::InvalidStateTransition { .. } => false,
            FormBuddyError::Storage(_) => true,
            FormBuddyError::Serialization(_) => false,
            FormBuddyError::Io(_) => true,
            FormBuddyError::InvalidInput(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FormBuddyError::Migration(_) => ErrorSeverity::Critical,
            FormBuddyError::Config(_) => ErrorSeverity::Critical,
            FormBuddyError::ConfigLoad(_) => ErrorSeverity::Critical,
            FormBuddyError::SessionAlreadyExists { .. } => ErrorSeverity::Warning,
            FormBuddyError::SessionNotFound { .. } => ErrorSeverity::Warning,
            FormBuddyError::InvalidInput(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = FormBuddyError::Storage("disk full".to_string());
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_session_errors_display_user() {
        let err = FormBuddyError::SessionAlreadyExists { user_id: 42 };
        assert_eq!(err.to_string(), "Session already exists for user 42");
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = FormBuddyError::SessionNotFound { user_id: 7 };
        assert_eq!(err.to_string(), "No session for user 7");
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = FormBuddyError::Config("Bot token is required".to_string());
        assert!(!err.is_recoverable());
        assert_eq!(err.severity().to_string(), "CRITICAL");
    }
}
