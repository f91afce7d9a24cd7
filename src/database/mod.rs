//! Database module
//!
//! This module handles database connections and the persistence sink
//! that receives finished forms.

pub mod connection;
pub mod repositories;
pub mod sink;

// Re-export commonly used database components
pub use connection::{DatabasePool, DatabaseConfig, create_pool, run_migrations, health_check};
pub use repositories::RegisteredUserRepository;
pub use sink::{PersistenceSink, MemorySink};
