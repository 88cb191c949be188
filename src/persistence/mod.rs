//! Persistence layer modules.

pub mod db;
pub mod schema;
pub mod store;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
pub use store::SettingsStore;
