//! Utility modules
//!
//! Error handling and logging setup shared by the rest of the crate.

pub mod errors;
pub mod logging;

pub use errors::{FormBuddyError, Result};
