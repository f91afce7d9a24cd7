//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use std::path::Path;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    /// Public username, used to build invite links
    #[serde(default)]
    pub username: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Where in-progress sessions live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

/// Session store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_url: String,
    pub prefix: String,
    /// Abandoned sessions are dropped after this many seconds
    pub ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

/// Registration flow behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Whether an already registered user may fill the form again
    pub allow_reregistration: bool,
    /// Whether `/start <user_id>` payloads are credited as referrals
    pub referrals_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            prefix: "formbuddy:".to_string(),
            ttl_seconds: 86_400,
            cleanup_interval_seconds: 300,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            allow_reregistration: true,
            referrals_enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "formbuddy.log".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` (optional) and `FORMBUDDY__*` environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::build(config::File::with_name("config").required(false))
    }

    /// Load settings from an explicit file, still honouring environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        Self::build(config::File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("FORMBUDDY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::FormBuddyError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                username: None,
            },
            database: None,
            session: SessionConfig::default(),
            registration: RegistrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_load_from_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[bot]
token = "12345:abc"
username = "form_buddy_bot"

[session]
backend = "redis"
ttl_seconds = 600
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.bot.token, "12345:abc");
        assert_eq!(settings.bot.username.as_deref(), Some("form_buddy_bot"));
        assert_eq!(settings.session.backend, SessionBackend::Redis);
        assert_eq!(settings.session.ttl_seconds, 600);
        assert_eq!(settings.session.prefix, "formbuddy:");
        assert!(settings.database.is_none());
        assert!(settings.registration.allow_reregistration);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[bot]\ntoken = \"from-file\"").unwrap();

        std::env::set_var("FORMBUDDY__BOT__TOKEN", "from-env");
        let settings = Settings::from_file(file.path());
        std::env::remove_var("FORMBUDDY__BOT__TOKEN");

        assert_eq!(settings.unwrap().bot.token, "from-env");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.session.backend, SessionBackend::Memory);
        assert_eq!(settings.session.ttl_seconds, 86_400);
        assert!(settings.registration.referrals_enabled);
    }
}
