//! Error types for the plume note store.
//!
//! This module defines custom error types that categorize different failures
//! that can occur while persisting, searching, and importing notes.

use std::io;

use thiserror::Error;

/// The main error type for the plume note store.
#[derive(Error, Debug)]
pub enum PlumeError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors surfaced by the underlying SQLite engine.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be opened or its schema could not be brought
    /// up to date. Fatal: nothing else may run without the store.
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// A single schema change failed to apply.
    #[error("Schema migration {version} failed: {message}")]
    SchemaMigration { version: i64, message: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// A legacy file could not be imported.
    #[error("Migration failed: {message}")]
    MigrationFailed { message: String },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}
