//! SQLite-backed repository implementations.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer, many concurrent readers.
//! - **Foreign keys enabled**: enforced at the connection level.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/001_initial_schema.sql`
//!   automatically when [`Database::open`] is called.
//!
//! ## Repository
//!
//! [`SqliteRepository`] holds the pool and implements every trait from
//! [`crate::persistence::traits`]. Integer keys cross the trait boundary as
//! decimal strings. UNIQUE violations surface as `Conflict`, FOREIGN KEY
//! violations as `NotFound` (see [`helpers::map_constraint`]).

mod academic_repo;
mod database;
pub(crate) mod helpers;
mod interaction_repo;
#[cfg(test)]
mod integration_tests;
mod note_repo;
mod user_repo;

pub use database::Database;

use sqlx::SqlitePool;

/// SQLite implementation of all repository traits.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
