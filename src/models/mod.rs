//! Data models module
//!
//! Finished form records and the registered-user rows they become.

pub mod record;
pub mod user;

pub use record::FormRecord;
pub use user::{RegisteredUser, NewRegistration};
