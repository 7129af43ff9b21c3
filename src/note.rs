//! Core data structures for the plume note store.
//!
//! This module contains the two persisted aggregates, Note and
//! DailyStats, along with the rules for the derived note fields.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when a note has no non-blank line to derive one from.
pub const UNTITLED: &str = "Untitled";

/// Maximum number of characters kept in a derived title.
const MAX_TITLE_LEN: usize = 50;

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, assigned once at creation
    pub id: String,
    /// Title derived from the first non-blank content line
    pub title: String,
    /// Note content in plain text; the source of truth
    pub content: String,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Number of whitespace-delimited tokens in the content
    pub word_count: i64,
    /// Whether the note is pinned in listings
    pub is_pinned: bool,
    /// Archived notes are hidden from listings and search but kept
    pub is_archived: bool,
}

impl Note {
    /// Creates an empty note with a fresh id and default fields
    pub fn new() -> Self {
        let now = Utc::now();

        Note {
            id: Uuid::new_v4().to_string(),
            title: UNTITLED.to_string(),
            content: String::new(),
            created_at: now,
            updated_at: now,
            word_count: 0,
            is_pinned: false,
            is_archived: false,
        }
    }

    /// Creates a note with the given content and derived fields filled in
    pub fn with_content(content: impl Into<String>) -> Self {
        let mut note = Note::new();
        note.content = content.into();
        note.refresh_derived();
        note
    }

    /// Recomputes the title from the content.
    ///
    /// The title is the first line that is non-blank after trimming,
    /// with any leading run of `#` heading markers and surrounding
    /// whitespace removed, truncated to 50 characters. Content with no
    /// non-blank line gets the "Untitled" placeholder.
    pub fn refresh_title(&mut self) {
        self.title = derive_title(&self.content);
    }

    /// Recomputes the word count from the content
    pub fn refresh_word_count(&mut self) {
        self.word_count = self.content.split_whitespace().count() as i64;
    }

    /// Recomputes all derived fields; called on every save
    pub fn refresh_derived(&mut self) {
        self.refresh_title();
        self.refresh_word_count();
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_title(content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let cleaned = trimmed.trim_start_matches('#').trim();
        return cleaned.chars().take(MAX_TITLE_LEN).collect();
    }

    UNTITLED.to_string()
}

/// Per-day aggregate of usage counters, keyed by the local calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Day key in `YYYY-MM-DD` form (local wall-clock date)
    pub date: String,
    /// Words written across all notes on this day
    pub words_written: i64,
    /// Notes created on this day
    pub notes_created: i64,
    /// Notes updated on this day
    pub notes_updated: i64,
    /// Minutes of active editing on this day
    pub active_minutes: i64,
    /// AI assist invocations triggered on this day
    pub ai_actions_used: i64,
}

impl DailyStats {
    /// Creates a zeroed row for the given day key
    pub fn new(date: impl Into<String>) -> Self {
        DailyStats {
            date: date.into(),
            words_written: 0,
            notes_created: 0,
            notes_updated: 0,
            active_minutes: 0,
            ai_actions_used: 0,
        }
    }

    /// The day key for the current local date
    pub fn today_key() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_strips_heading_markers() {
        let note = Note::with_content("# Hello World\nmore text");
        assert_eq!(note.title, "Hello World");
    }

    #[test]
    fn title_skips_blank_lines() {
        let note = Note::with_content("\n   \n## Second line wins\nbody");
        assert_eq!(note.title, "Second line wins");
    }

    #[test]
    fn title_falls_back_to_untitled() {
        assert_eq!(Note::with_content("").title, UNTITLED);
        assert_eq!(Note::with_content("  \n\t\n").title, UNTITLED);
    }

    #[test]
    fn title_is_capped_at_fifty_chars() {
        let long = "x".repeat(80);
        let note = Note::with_content(long);
        assert_eq!(note.title.chars().count(), 50);
    }

    #[test]
    fn heading_only_line_yields_empty_title() {
        // A line of markers strips to nothing; Untitled is reserved for
        // content with no non-blank line at all.
        let note = Note::with_content("###\nhello");
        assert_eq!(note.title, "");
    }

    #[test]
    fn word_count_counts_whitespace_delimited_tokens() {
        let note = Note::with_content("one two\tthree\nfour   five");
        assert_eq!(note.word_count, 5);

        let blank = Note::with_content("   \n\t ");
        assert_eq!(blank.word_count, 0);
    }

    #[test]
    fn new_note_has_fresh_id_and_consistent_timestamps() {
        let a = Note::new();
        let b = Note::new();
        assert_ne!(a.id, b.id);
        assert!(a.updated_at >= a.created_at);
    }
}
