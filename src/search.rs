//! Ranked full-text search with a substring fallback.
//!
//! Queries run against the FTS5 companion index with bm25 relevance
//! ranking. Whatever the user types must produce a result list, so any
//! ranked-query failure (unbalanced quotes and other tokenizer-hostile
//! input included) falls back to a plain case-insensitive substring
//! scan, and the fallback itself degrades to an empty list.

use chrono::{Duration, Local, NaiveDate, TimeZone};
use log::{debug, warn};
use rusqlite::params;

use crate::store::{note_from_row, NOTE_COLUMNS};
use crate::{DataStore, Note, Result};

/// Maximum number of results returned by a search.
const SEARCH_LIMIT: usize = 50;

/// Default number of notes returned for a blank query.
const RECENT_LIMIT: usize = 20;

/// Read-only query surface over the note store.
#[derive(Clone)]
pub struct SearchEngine {
    store: DataStore,
}

impl SearchEngine {
    pub fn new(store: DataStore) -> Self {
        SearchEngine { store }
    }

    /// Searches notes by title and content.
    ///
    /// A blank query lists recent notes. Otherwise every whitespace
    /// token becomes a prefix term, combined with implicit AND, ranked
    /// best-first by bm25. This never fails: ranked-query errors fall
    /// back to substring matching, and fallback errors yield an empty
    /// list.
    pub fn search(&self, query: &str) -> Vec<Note> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return self.recent_notes(RECENT_LIMIT);
        }

        match self.ranked_search(trimmed) {
            Ok(notes) => notes,
            Err(e) => {
                debug!("Ranked search failed for {:?}, using substring fallback: {}", trimmed, e);
                self.substring_search(trimmed)
            }
        }
    }

    fn ranked_search(&self, query: &str) -> Result<Vec<Note>> {
        let match_expr = fts_prefix_query(query);

        self.store.read(|conn| {
            let sql = format!(
                "SELECT {} FROM notes
                 JOIN notes_fts ON notes.rowid = notes_fts.rowid
                 WHERE notes_fts MATCH ?1 AND notes.isArchived = 0
                 ORDER BY bm25(notes_fts) ASC
                 LIMIT ?2",
                qualified_note_columns()
            );
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map(params![match_expr, SEARCH_LIMIT as i64], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        })
    }

    fn substring_search(&self, query: &str) -> Vec<Note> {
        let pattern = format!("%{}%", query);

        let result = self.store.read(|conn| {
            let sql = format!(
                "SELECT {} FROM notes
                 WHERE isArchived = 0
                   AND (title LIKE ?1 OR content LIKE ?1)
                 ORDER BY updatedAt DESC
                 LIMIT ?2",
                NOTE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map(params![pattern, SEARCH_LIMIT as i64], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        });

        match result {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Substring search failed for {:?}: {}", query, e);
                Vec::new()
            }
        }
    }

    /// The most recently updated non-archived notes.
    pub fn recent_notes(&self, limit: usize) -> Vec<Note> {
        let result = self.store.read(|conn| {
            let sql = format!(
                "SELECT {} FROM notes
                 WHERE isArchived = 0
                 ORDER BY updatedAt DESC
                 LIMIT ?1",
                NOTE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map(params![limit as i64], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        });

        match result {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Failed to load recent notes: {}", e);
                Vec::new()
            }
        }
    }

    /// Non-archived notes created on the given local calendar day,
    /// newest first.
    pub fn notes_for_date(&self, date: NaiveDate) -> Vec<Note> {
        let start_local = match Local.from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()).earliest() {
            Some(start) => start,
            None => {
                warn!("No local midnight exists for {}", date);
                return Vec::new();
            }
        };
        let start = start_local.with_timezone(&chrono::Utc);
        let end = start + Duration::days(1);

        let result = self.store.read(|conn| {
            let sql = format!(
                "SELECT {} FROM notes
                 WHERE isArchived = 0
                   AND createdAt >= ?1 AND createdAt < ?2
                 ORDER BY createdAt DESC",
                NOTE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map(params![start, end], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        });

        match result {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Failed to load notes for {}: {}", date, e);
                Vec::new()
            }
        }
    }
}

/// Prefixes every [`NOTE_COLUMNS`] column with the notes table, for
/// queries that join against the index.
fn qualified_note_columns() -> String {
    NOTE_COLUMNS
        .split(", ")
        .map(|col| format!("notes.{}", col))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns free text into an FTS5 match expression: each whitespace token
/// becomes a prefix term, joined with implicit AND. Tokens the FTS
/// grammar rejects (punctuation, stray quotes) make the match
/// expression fail to parse, which routes the query to the substring
/// fallback.
fn fts_prefix_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| format!("{}*", token))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seeded_engine() -> (SearchEngine, Vec<Note>) {
        let store = DataStore::open_in_memory().unwrap();

        let notes = vec![
            Note::with_content("# Grocery list\napples and oranges"),
            Note::with_content("# Meeting notes\ndiscussed the hello protocol"),
            Note::with_content("# Hello world\na classic greeting"),
        ];
        for note in &notes {
            store.upsert_note(note).unwrap();
        }

        (SearchEngine::new(store), notes)
    }

    #[test]
    fn prefix_tokens_match_word_starts() {
        let (engine, _) = seeded_engine();

        let results = engine.search("hel");
        let titles: Vec<_> = results.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"Hello world"));
        assert!(titles.contains(&"Meeting notes"));
    }

    #[test]
    fn multiple_tokens_are_anded() {
        let (engine, _) = seeded_engine();

        let results = engine.search("hello greet");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Hello world");
    }

    #[test]
    fn blank_query_lists_recent_notes() {
        let (engine, _) = seeded_engine();

        let searched = engine.search("   ");
        let recent = engine.recent_notes(20);
        assert_eq!(searched, recent);
        assert_eq!(searched.len(), 3);
    }

    #[test]
    fn archived_notes_never_match() {
        let store = DataStore::open_in_memory().unwrap();
        let mut hidden = Note::with_content("secret archived treasure");
        hidden.is_archived = true;
        store.upsert_note(&hidden).unwrap();
        store
            .upsert_note(&Note::with_content("visible treasure map"))
            .unwrap();

        let engine = SearchEngine::new(store);

        assert_eq!(engine.search("treasure").len(), 1);
        assert_eq!(engine.recent_notes(20).len(), 1);
        assert!(engine.search("archived").is_empty());
    }

    #[test]
    fn hostile_input_falls_back_to_substring_match() {
        let store = DataStore::open_in_memory().unwrap();
        store
            .upsert_note(&Note::with_content("notes on the c++ standard (draft)"))
            .unwrap();
        let engine = SearchEngine::new(store);

        // Punctuation the FTS tokenizer drops still matches by substring
        let results = engine.search("c++");
        assert_eq!(results.len(), 1);

        // And genuinely unmatched garbage yields an empty list, not an error
        assert!(engine.search("((((").is_empty());
    }

    #[test]
    fn deleted_notes_disappear_from_results() {
        let (engine, notes) = seeded_engine();
        let target = &notes[2];

        assert!(!engine.search("classic").is_empty());
        engine.store.delete_note(&target.id).unwrap();

        assert!(engine.search("classic").is_empty());
        assert!(engine
            .recent_notes(20)
            .iter()
            .all(|n| n.id != target.id));
    }

    #[test]
    fn notes_for_date_windows_on_creation_day() {
        let store = DataStore::open_in_memory().unwrap();

        let today = Note::with_content("written today");
        let mut yesterday = Note::with_content("written yesterday");
        yesterday.created_at = yesterday.created_at - Duration::days(1);
        yesterday.updated_at = Utc::now();

        store.upsert_note(&today).unwrap();
        store.upsert_note(&yesterday).unwrap();

        let engine = SearchEngine::new(store);
        let results = engine.notes_for_date(Local::now().date_naive());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, today.id);
    }

    #[test]
    fn results_are_capped() {
        let store = DataStore::open_in_memory().unwrap();
        for i in 0..60 {
            store
                .upsert_note(&Note::with_content(format!("filler note number {}", i)))
                .unwrap();
        }
        let engine = SearchEngine::new(store);

        assert_eq!(engine.search("filler").len(), 50);
        assert_eq!(engine.recent_notes(20).len(), 20);
    }
}
