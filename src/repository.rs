//! Note repository: CRUD, debounced autosave, and usage statistics.
//!
//! The repository keeps an in-memory cache of the non-archived listing
//! (most recently updated first), tracks the currently open note, and
//! owns the single pending autosave timer. Write failures are logged
//! and leave the in-memory state untouched; they never surface to the
//! caller as a crash.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, error, info, warn};
use rusqlite::{params, OptionalExtension};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::{DailyStats, DataStore, Note, Result};

/// Quiescence window after the last edit before autosave fires.
const AUTOSAVE_QUIESCENCE: Duration = Duration::from_secs(3);

/// Manages note persistence and the in-memory listing used by callers.
#[derive(Clone)]
pub struct NoteRepository {
    /// Durable storage backend
    store: DataStore,

    /// Cached non-archived listing, ordered by update time descending
    notes: Arc<Mutex<Vec<Note>>>,

    /// The currently open note, if any
    current: Arc<Mutex<Option<Note>>>,

    /// Pending autosave task for the active editing session
    autosave: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Revision counter bumped whenever the listing changes
    listing_tx: Arc<watch::Sender<u64>>,
}

impl NoteRepository {
    /// Creates a repository over the given store and loads the listing.
    pub fn new(store: DataStore) -> Self {
        let (listing_tx, _) = watch::channel(0);

        let repository = NoteRepository {
            store,
            notes: Arc::new(Mutex::new(Vec::new())),
            current: Arc::new(Mutex::new(None)),
            autosave: Arc::new(Mutex::new(None)),
            listing_tx: Arc::new(listing_tx),
        };

        repository.reload();
        repository
    }

    /// Re-reads the listing from the store. A read failure leaves an
    /// empty listing and is logged.
    pub fn reload(&self) {
        match self.store.load_listing() {
            Ok(listing) => {
                info!("Loaded {} notes", listing.len());
                if let Ok(mut notes) = self.notes.lock() {
                    *notes = listing;
                }
                self.notify_listing_changed();
            }
            Err(e) => {
                error!("Failed to load note listing: {}", e);
                if let Ok(mut notes) = self.notes.lock() {
                    notes.clear();
                }
            }
        }
    }

    /// Saves a note: stamps the update time, recomputes the derived
    /// fields, and persists the row. On failure the error is logged and
    /// the in-memory state is not advanced.
    pub fn save(&self, note: &mut Note) {
        note.updated_at = Utc::now();

        if let Err(e) = self.persist(note) {
            error!("Failed to save note {}: {}", note.id, e);
        }
    }

    /// The save path without the update-time stamp: recomputes derived
    /// fields, writes the row, and updates the in-memory listing.
    ///
    /// The file importer uses this directly because it must preserve
    /// timestamps parsed from legacy filenames.
    pub(crate) fn persist(&self, note: &mut Note) -> Result<()> {
        note.refresh_derived();
        self.store.upsert_note(note)?;
        self.apply_to_listing(note);
        debug!("Persisted note {}", note.id);
        Ok(())
    }

    fn apply_to_listing(&self, note: &Note) {
        match self.notes.lock() {
            Ok(mut notes) => {
                if note.is_archived {
                    notes.retain(|n| n.id != note.id);
                } else if let Some(existing) = notes.iter_mut().find(|n| n.id == note.id) {
                    *existing = note.clone();
                } else {
                    notes.push(note.clone());
                }

                notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            }
            Err(_) => {
                warn!("Failed to acquire lock on note listing; cache not updated");
            }
        }

        // Refresh the open-note reference if it is the one we saved
        if let Ok(mut current) = self.current.lock() {
            if current.as_ref().is_some_and(|c| c.id == note.id) {
                *current = Some(note.clone());
            }
        }

        self.notify_listing_changed();
    }

    /// Creates a new note with the given content, saves it, and marks
    /// it as the currently open note.
    pub fn create_note(&self, content: &str) -> Note {
        let mut note = Note::with_content(content);
        self.save(&mut note);

        if let Ok(mut current) = self.current.lock() {
            *current = Some(note.clone());
        }

        info!("Created note {}", note.id);
        note
    }

    /// Deletes a note row (and its search-index entries) and removes it
    /// from the listing. If the deleted note was the currently open
    /// one, the most-recently-updated remaining note takes its place,
    /// or a fresh blank note when none remain. Underlying failure is a
    /// logged no-op.
    pub fn delete(&self, note: &Note) {
        if let Err(e) = self.store.delete_note(&note.id) {
            error!("Failed to delete note {}: {}", note.id, e);
            return;
        }

        let next = match self.notes.lock() {
            Ok(mut notes) => {
                notes.retain(|n| n.id != note.id);
                notes.first().cloned()
            }
            Err(_) => {
                warn!("Failed to acquire lock on note listing during delete");
                None
            }
        };
        self.notify_listing_changed();

        let was_current = match self.current.lock() {
            Ok(current) => current.as_ref().is_some_and(|c| c.id == note.id),
            Err(_) => false,
        };

        if was_current {
            match next {
                Some(candidate) => {
                    if let Ok(mut current) = self.current.lock() {
                        *current = Some(candidate);
                    }
                }
                // Nothing left to open; start over with a blank note
                None => {
                    self.create_note("");
                }
            }
        }

        info!("Deleted note {}", note.id);
    }

    /// Looks up a note in the in-memory listing.
    pub fn get_note(&self, id: &str) -> Option<Note> {
        match self.notes.lock() {
            Ok(notes) => notes.iter().find(|n| n.id == id).cloned(),
            Err(_) => {
                warn!("Failed to acquire lock on note listing");
                None
            }
        }
    }

    /// The most recently updated note, if any.
    pub fn get_last_edited(&self) -> Option<Note> {
        match self.notes.lock() {
            Ok(notes) => notes.first().cloned(),
            Err(_) => None,
        }
    }

    /// A snapshot of the current listing.
    pub fn list_notes(&self) -> Vec<Note> {
        match self.notes.lock() {
            Ok(notes) => notes.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// The currently open note, if any.
    pub fn current_note(&self) -> Option<Note> {
        match self.current.lock() {
            Ok(current) => current.clone(),
            Err(_) => None,
        }
    }

    /// Subscribes to listing-change notifications. The channel carries
    /// a revision counter; any observed increase means the listing
    /// should be re-read.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.listing_tx.subscribe()
    }

    fn notify_listing_changed(&self) {
        self.listing_tx.send_modify(|revision| *revision += 1);
    }

    /// Schedules an autosave for the note after the quiescence window.
    ///
    /// Any previously pending autosave is cancelled before the new one
    /// is armed; both steps happen under the handle lock so two
    /// back-to-back calls can never both fire.
    pub fn schedule_auto_save(&self, note: Note) {
        let mut pending = match self.autosave.lock() {
            Ok(pending) => pending,
            Err(_) => {
                error!("Failed to acquire lock on autosave handle");
                return;
            }
        };

        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let repository = self.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(AUTOSAVE_QUIESCENCE).await;

            let mut note = note;
            repository.save(&mut note);
            debug!("Auto-saved note {}", note.id);
        }));
    }

    /// Cancels any pending autosave. Safe to call when nothing is
    /// pending.
    pub fn cancel_pending_auto_save(&self) {
        if let Ok(mut pending) = self.autosave.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }

    /// Cancels any pending autosave and saves synchronously. Used on
    /// note switch, explicit save, and application shutdown.
    pub fn save_immediately(&self, note: &mut Note) {
        self.cancel_pending_auto_save();
        self.save(note);
    }

    /// Records a note creation in today's usage counters.
    pub fn track_note_created(&self) {
        self.update_daily_stats(|stats| stats.notes_created += 1);
    }

    /// Records a note update in today's usage counters.
    pub fn track_note_updated(&self) {
        self.update_daily_stats(|stats| stats.notes_updated += 1);
    }

    /// Records words written in today's usage counters.
    pub fn track_words_written(&self, count: i64) {
        self.update_daily_stats(|stats| stats.words_written += count);
    }

    /// Records active editing time in today's usage counters.
    pub fn track_active_minutes(&self, minutes: i64) {
        self.update_daily_stats(|stats| stats.active_minutes += minutes);
    }

    /// Records an AI assist invocation in today's usage counters.
    pub fn track_ai_action(&self) {
        self.update_daily_stats(|stats| stats.ai_actions_used += 1);
    }

    /// Total number of stored note rows, archived included. The file
    /// importer uses this to decide whether the store is pristine.
    pub(crate) fn store_note_count(&self) -> Result<i64> {
        self.store.note_count()
    }

    /// Fetches the usage counters for a given day key.
    pub fn daily_stats(&self, date: &str) -> Option<DailyStats> {
        let result = self.store.read(|conn| {
            let stats = conn
                .query_row(
                    "SELECT date, wordsWritten, notesCreated, notesUpdated, activeMinutes, aiActionsUsed
                     FROM daily_stats WHERE date = ?1",
                    params![date],
                    daily_stats_from_row,
                )
                .optional()?;
            Ok(stats)
        });

        match result {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to read daily stats for {}: {}", date, e);
                None
            }
        }
    }

    /// Read-modify-write upsert of today's stats row. Created lazily on
    /// the first activity of a day; failures are logged and swallowed.
    fn update_daily_stats<F>(&self, apply: F)
    where
        F: FnOnce(&mut DailyStats),
    {
        let date = DailyStats::today_key();

        let result = self.store.write(|tx| {
            let mut stats = tx
                .query_row(
                    "SELECT date, wordsWritten, notesCreated, notesUpdated, activeMinutes, aiActionsUsed
                     FROM daily_stats WHERE date = ?1",
                    params![date],
                    daily_stats_from_row,
                )
                .optional()?
                .unwrap_or_else(|| DailyStats::new(&date));

            apply(&mut stats);

            tx.execute(
                "INSERT OR REPLACE INTO daily_stats
                     (date, wordsWritten, notesCreated, notesUpdated, activeMinutes, aiActionsUsed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stats.date,
                    stats.words_written,
                    stats.notes_created,
                    stats.notes_updated,
                    stats.active_minutes,
                    stats.ai_actions_used
                ],
            )?;
            Ok(())
        });

        if let Err(e) = result {
            error!("Failed to update daily stats for {}: {}", date, e);
        }
    }
}

fn daily_stats_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyStats> {
    Ok(DailyStats {
        date: row.get(0)?,
        words_written: row.get(1)?,
        notes_created: row.get(2)?,
        notes_updated: row.get(3)?,
        active_minutes: row.get(4)?,
        ai_actions_used: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> NoteRepository {
        NoteRepository::new(DataStore::open_in_memory().unwrap())
    }

    #[test]
    fn create_save_and_lookup() {
        let repo = repository();
        let note = repo.create_note("# First\nbody");

        assert_eq!(repo.get_note(&note.id).unwrap().title, "First");
        assert_eq!(repo.current_note().unwrap().id, note.id);
        assert_eq!(repo.get_last_edited().unwrap().id, note.id);
    }

    #[test]
    fn save_never_decreases_updated_at() {
        let repo = repository();
        let mut note = repo.create_note("content");
        let first = note.updated_at;

        repo.save(&mut note);
        assert!(note.updated_at >= first);
    }

    #[test]
    fn save_refreshes_derived_fields_and_resorts_listing() {
        let repo = repository();
        let mut a = repo.create_note("note a");
        let _b = repo.create_note("note b");

        a.content = "# Renamed\none two three".to_string();
        repo.save(&mut a);

        let listing = repo.list_notes();
        assert_eq!(listing[0].id, a.id);
        assert_eq!(listing[0].title, "Renamed");
        assert_eq!(listing[0].word_count, 4);
    }

    #[test]
    fn delete_removes_note_and_promotes_most_recent() {
        let repo = repository();
        let older = repo.create_note("older");
        let newer = repo.create_note("newer");

        repo.delete(&newer);

        assert!(repo.get_note(&newer.id).is_none());
        assert_eq!(repo.current_note().unwrap().id, older.id);
    }

    #[test]
    fn deleting_the_last_note_opens_a_fresh_blank_one() {
        let repo = repository();
        let only = repo.create_note("alone");

        repo.delete(&only);

        let current = repo.current_note().unwrap();
        assert_ne!(current.id, only.id);
        assert_eq!(current.content, "");
        assert_eq!(repo.list_notes().len(), 1);
    }

    #[test]
    fn listing_changes_bump_the_revision() {
        let repo = repository();
        let rx = repo.subscribe();
        let before = *rx.borrow();

        repo.create_note("anything");
        assert!(*rx.borrow() > before);
    }

    #[test]
    fn daily_stats_accumulate_per_day() {
        let repo = repository();
        repo.track_note_created();
        repo.track_words_written(5);
        repo.track_words_written(7);
        repo.track_ai_action();

        let stats = repo.daily_stats(&DailyStats::today_key()).unwrap();
        assert_eq!(stats.notes_created, 1);
        assert_eq!(stats.words_written, 12);
        assert_eq!(stats.ai_actions_used, 1);
        assert_eq!(stats.notes_updated, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_debounce_persists_only_the_last_edit() {
        let store = DataStore::open_in_memory().unwrap();
        let repo = NoteRepository::new(store.clone());

        let mut note = Note::with_content("first");
        repo.schedule_auto_save(note.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;

        note.content = "second".to_string();
        repo.schedule_auto_save(note.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;

        note.content = "third".to_string();
        repo.schedule_auto_save(note.clone());

        // Just before the quiescence window elapses, nothing persisted
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(store.note_count().unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.note_count().unwrap(), 1);
        let saved = store.get_note(&note.id).unwrap().unwrap();
        assert_eq!(saved.content, "third");
    }

    #[tokio::test(start_paused = true)]
    async fn save_immediately_cancels_the_pending_autosave() {
        let store = DataStore::open_in_memory().unwrap();
        let repo = NoteRepository::new(store.clone());

        let mut note = Note::with_content("stale draft");
        repo.schedule_auto_save(note.clone());

        note.content = "flushed on switch".to_string();
        repo.save_immediately(&mut note);

        // Let the cancelled timer's deadline pass; the stale content
        // must not overwrite the flushed save.
        tokio::time::sleep(Duration::from_secs(4)).await;
        let saved = store.get_note(&note.id).unwrap().unwrap();
        assert_eq!(saved.content, "flushed on switch");
        assert_eq!(store.note_count().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_when_nothing_is_pending() {
        let repo = repository();
        repo.cancel_pending_auto_save();
        repo.cancel_pending_auto_save();
    }
}
