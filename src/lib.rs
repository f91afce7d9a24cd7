//! FormBuddy Telegram Bot
//!
//! A Telegram bot that walks each user through a multi-step registration
//! form. The conversation engine in [`state`] is independent of the
//! transport: it consumes `(user_id, text)` pairs and produces replies,
//! while [`handlers`] adapts it to teloxide.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{FormBuddyError, Result};

// Re-export main components for easy access
pub use database::{PersistenceSink, MemorySink, RegisteredUserRepository};
pub use state::{DialogueDriver, DriverOptions, FormRegistry, SessionStore, MemorySessionStore, RedisSessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
