//! The Diesel/SQLite-backed implementation of [`crate::port::Store`].

pub mod model;
pub mod pool;
pub mod schema;
pub mod sqlite;

pub use pool::{create_pool, run_migrations, DbPool, MIGRATIONS};
pub use sqlite::SqliteStore;
