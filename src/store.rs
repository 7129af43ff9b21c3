//! Durable, transactional note storage on SQLite.
//!
//! The store owns the physical schema, applies versioned schema changes
//! at startup, and hands out transactional write access and snapshot
//! reads. A full-text companion index over (title, content) is kept in
//! sync with the notes table by triggers, so index maintenance always
//! commits atomically with the row mutation it belongs to.

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::{Note, PlumeError, Result};

/// Column list shared by every query that maps rows into [`Note`]s.
pub(crate) const NOTE_COLUMNS: &str =
    "id, title, content, createdAt, updatedAt, wordCount, isPinned, isArchived";

/// A single versioned schema change.
struct SchemaChange {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered list of schema changes. Each entry is applied at most once,
/// inside its own transaction, tracked by the schema_migrations table.
const SCHEMA_CHANGES: &[SchemaChange] = &[SchemaChange {
    version: 1,
    name: "initial",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = r#"
CREATE TABLE notes (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    createdAt DATETIME NOT NULL,
    updatedAt DATETIME NOT NULL,
    wordCount INTEGER NOT NULL DEFAULT 0,
    isPinned INTEGER NOT NULL DEFAULT 0,
    isArchived INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_notes_updated ON notes(updatedAt);

CREATE VIRTUAL TABLE notes_fts USING fts5(
    title,
    content,
    content='notes',
    content_rowid='rowid'
);

CREATE TRIGGER notes_ai AFTER INSERT ON notes BEGIN
    INSERT INTO notes_fts(rowid, title, content)
    VALUES (new.rowid, new.title, new.content);
END;

CREATE TRIGGER notes_ad AFTER DELETE ON notes BEGIN
    INSERT INTO notes_fts(notes_fts, rowid, title, content)
    VALUES ('delete', old.rowid, old.title, old.content);
END;

CREATE TRIGGER notes_au AFTER UPDATE ON notes BEGIN
    INSERT INTO notes_fts(notes_fts, rowid, title, content)
    VALUES ('delete', old.rowid, old.title, old.content);
    INSERT INTO notes_fts(rowid, title, content)
    VALUES (new.rowid, new.title, new.content);
END;

CREATE TABLE daily_stats (
    date TEXT PRIMARY KEY NOT NULL,
    wordsWritten INTEGER NOT NULL DEFAULT 0,
    notesCreated INTEGER NOT NULL DEFAULT 0,
    notesUpdated INTEGER NOT NULL DEFAULT 0,
    activeMinutes INTEGER NOT NULL DEFAULT 0,
    aiActionsUsed INTEGER NOT NULL DEFAULT 0
);
"#;

/// Thread-safe handle to the note database.
///
/// SQLite is a single-writer engine; the connection mutex serializes
/// write transactions in submission order. Reads execute against the
/// last committed state.
#[derive(Clone)]
pub struct DataStore {
    conn: Arc<Mutex<Connection>>,
}

impl DataStore {
    /// Opens (creating if necessary) the database at the given path and
    /// brings its schema up to date.
    ///
    /// Any failure here means the store is unusable and startup must
    /// abort.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PlumeError::StoreUnavailable {
                message: format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ),
            })?;
        }

        info!("Opening note database at {}", path.display());
        let conn = Connection::open(path).map_err(|e| PlumeError::StoreUnavailable {
            message: format!("failed to open database {}: {}", path.display(), e),
        })?;

        Self::initialize(conn)
    }

    /// Opens an in-memory database; used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| PlumeError::StoreUnavailable {
            message: format!("failed to open in-memory database: {}", e),
        })?;

        Self::initialize(conn)
    }

    fn initialize(mut conn: Connection) -> Result<Self> {
        configure_pragmas(&conn).map_err(|e| PlumeError::StoreUnavailable {
            message: format!("failed to configure database: {}", e),
        })?;

        migrate_schema(&mut conn)?;

        Ok(DataStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Executes a mutation inside a transaction.
    ///
    /// All effects commit atomically; if the closure returns an error
    /// the transaction is rolled back entirely. Concurrent writers are
    /// serialized by the connection mutex.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Executes a query against the committed state.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PlumeError::LockAcquisitionFailed {
                message: "Failed to acquire lock on database connection".to_string(),
            })
    }

    /// Inserts or replaces a note row; the full-text index entry is
    /// retracted and re-added in the same transaction by the triggers.
    pub fn upsert_note(&self, note: &Note) -> Result<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO notes (id, title, content, createdAt, updatedAt, wordCount, isPinned, isArchived)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     content = excluded.content,
                     createdAt = excluded.createdAt,
                     updatedAt = excluded.updatedAt,
                     wordCount = excluded.wordCount,
                     isPinned = excluded.isPinned,
                     isArchived = excluded.isArchived",
                params![
                    note.id,
                    note.title,
                    note.content,
                    note.created_at,
                    note.updated_at,
                    note.word_count,
                    note.is_pinned,
                    note.is_archived
                ],
            )?;
            Ok(())
        })
    }

    /// Removes a note row and its index entries. Returns whether a row
    /// was actually removed.
    pub fn delete_note(&self, id: &str) -> Result<bool> {
        self.write(|tx| {
            let removed = tx.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }

    /// Fetches a single note by id.
    pub fn get_note(&self, id: &str) -> Result<Option<Note>> {
        self.read(|conn| {
            let sql = format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS);
            let note = conn
                .query_row(&sql, params![id], note_from_row)
                .optional()?;
            Ok(note)
        })
    }

    /// Total number of note rows, archived included.
    pub fn note_count(&self) -> Result<i64> {
        self.read(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
            Ok(count)
        })
    }

    /// The non-archived listing, most recently updated first.
    pub fn load_listing(&self) -> Result<Vec<Note>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {} FROM notes WHERE isArchived = 0 ORDER BY updatedAt DESC",
                NOTE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map([], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        })
    }
}

/// Maps a row selected with [`NOTE_COLUMNS`] into a [`Note`].
pub(crate) fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        word_count: row.get(5)?,
        is_pinned: row.get(6)?,
        is_archived: row.get(7)?,
    })
}

fn configure_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    debug!("Configuring SQLite pragmas");

    // WAL for concurrent readers alongside the single writer
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

    Ok(())
}

/// Applies every pending schema change, each inside its own
/// transaction, so a failure leaves prior changes intact and the failed
/// change unapplied.
fn migrate_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| PlumeError::StoreUnavailable {
        message: format!("failed to create schema_migrations table: {}", e),
    })?;

    for change in SCHEMA_CHANGES {
        let applied: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
                params![change.version],
                |row| row.get(0),
            )
            .map_err(|e| PlumeError::StoreUnavailable {
                message: format!("failed to read applied schema versions: {}", e),
            })?;

        if applied {
            debug!("Schema change v{} ({}) already applied", change.version, change.name);
            continue;
        }

        info!("Applying schema change v{} ({})", change.version, change.name);

        let tx = conn.transaction().map_err(PlumeError::Sqlite)?;
        tx.execute_batch(change.sql)
            .map_err(|e| PlumeError::SchemaMigration {
                version: change.version,
                message: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![change.version, change.name],
        )
        .map_err(|e| PlumeError::SchemaMigration {
            version: change.version,
            message: e.to_string(),
        })?;
        tx.commit().map_err(|e| PlumeError::SchemaMigration {
            version: change.version,
            message: e.to_string(),
        })?;
    }

    Ok(())
}
