//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;

pub use user::RegisteredUserRepository;
