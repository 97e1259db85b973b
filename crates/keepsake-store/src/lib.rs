// ABOUTME: Durable persistence for keepsake state.
// ABOUTME: Provides the SQLite-backed PersistentState implementation and its error type.

pub mod sqlite;

pub use sqlite::{SqliteError, SqlitePersistentState};
