//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A blocking database task panicked or was aborted.
    #[error("Database task failed: {0}")]
    Task(String),

    /// A stored value could not be decoded.
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidData { column: String, value: String },

    /// A referenced row does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
}
