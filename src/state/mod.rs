//! State management module
//!
//! This module holds the conversation engine: per-user sessions, the form
//! transition table, session storage backends and the dialogue driver.

pub mod context;
pub mod driver;
pub mod locks;
pub mod redis_store;
pub mod scenarios;
pub mod storage;

// Re-export commonly used state components
pub use context::ConversationSession;
pub use driver::{DialogueDriver, DriverOptions, OutgoingMessage, Outcome, Reply};
pub use locks::UserLocks;
pub use redis_store::RedisSessionStore;
pub use scenarios::{FieldKind, FieldSpec, FormDefinition, FormRegistry, Step, Transition, registration_form, REGISTRATION_FORM};
pub use storage::{MemorySessionStore, SessionJanitor, SessionMutator, SessionStore};
