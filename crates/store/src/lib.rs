//! Persistence adapters for the petition pipeline.
//!
//! Both adapters implement the [`pipeline::AgentRepository`] and
//! [`pipeline::PetitionStore`] ports:
//!
//! | Adapter | Backing | Use |
//! |---------|---------|-----|
//! | [`SqliteStore`] | SQLite through `sqlx`, versioned migrations | production |
//! | [`MemoryStore`] | `Mutex`-guarded maps | tests, throwaway runs |
//!
//! Both refuse to modify a petition whose stored status is terminal.

mod memory;
mod migrations;
mod rows;
mod sqlite;

pub use memory::MemoryStore;
pub use migrations::run_migrations;
pub use sqlite::SqliteStore;
