//! Wrench Storage crate - chat session persistence.
//!
//! `SessionRepository` is the storage seam used by the session store.
//! Two implementations ship here: an in-memory map for tests and
//! single-process deployments, and a WAL-mode SQLite database.

pub mod db;
pub mod memory;
pub mod migrations;
pub mod repository;
pub mod sqlite;

pub use db::Database;
pub use memory::InMemorySessionRepository;
pub use repository::SessionRepository;
pub use sqlite::SqliteSessionRepository;
