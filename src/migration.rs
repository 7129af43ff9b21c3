//! One-time import of legacy loose-file notes into the store.
//!
//! Earlier releases kept each note as a markdown file named
//! `[<uuid>]-[yyyy-MM-dd-HH-mm-ss].md` in a documents folder. The
//! migration parses identity and timestamps out of those filenames,
//! persists the notes through the repository, and moves the originals
//! into an `archived/` subdirectory so the import never runs twice.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use log::{info, warn};
use regex::Regex;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{Config, MigrationSummary, Note, NoteRepository, PlumeError, Result};

/// Timestamp layout embedded in legacy filenames (local wall-clock).
const FILENAME_TIMESTAMP: &str = "%Y-%m-%d-%H-%M-%S";

/// Imports legacy markdown files into the note store.
pub struct MigrationService {
    config: Config,
    repository: NoteRepository,

    /// Matches one bracketed filename segment
    segment_re: Regex,
}

impl MigrationService {
    pub fn new(config: Config, repository: NoteRepository) -> Self {
        // The pattern is a constant; it cannot fail to compile.
        let segment_re = Regex::new(r"\[([^\[\]]+)\]").expect("valid segment pattern");

        MigrationService {
            config,
            repository,
            segment_re,
        }
    }

    /// Whether the one-time import should run: the legacy directory
    /// exists and holds at least one markdown file, and the store has
    /// never held a note. Any error while checking means "no".
    pub fn needs_migration(&self) -> bool {
        if !self.config.import_dir.is_dir() {
            return false;
        }

        if legacy_files(&self.config.import_dir).is_empty() {
            return false;
        }

        match self.repository.store_note_count() {
            Ok(count) => count == 0,
            Err(e) => {
                warn!("Could not determine store size, skipping migration: {}", e);
                false
            }
        }
    }

    /// Imports every top-level markdown file from the legacy directory.
    ///
    /// Each file is independent: a failure to read, persist, or archive
    /// one file is recorded in the summary and the rest continue. The
    /// archive move is the commit point; a file that fails to archive
    /// is reported even though its note may already be stored.
    pub fn migrate(&self) -> Result<MigrationSummary> {
        let candidates = legacy_files(&self.config.import_dir);
        info!(
            "Migrating {} legacy files from {}",
            candidates.len(),
            self.config.import_dir.display()
        );

        let archive_dir = self.config.archive_dir();
        fs::create_dir_all(&archive_dir).map_err(|e| PlumeError::MigrationFailed {
            message: format!(
                "failed to create archive directory {}: {}",
                archive_dir.display(),
                e
            ),
        })?;

        let mut summary = MigrationSummary {
            total_files: candidates.len(),
            ..Default::default()
        };

        for path in candidates {
            match self.migrate_file(&path, &archive_dir) {
                Ok(id) => {
                    info!("Migrated {} as note {}", path.display(), id);
                    summary.migrated += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            "Migration finished: {}/{} files imported",
            summary.migrated, summary.total_files
        );
        Ok(summary)
    }

    /// Imports a single file and moves it into the archive directory.
    fn migrate_file(&self, path: &Path, archive_dir: &Path) -> Result<String> {
        let content = fs::read_to_string(path)?;

        let (id, timestamp) = self.parse_filename(path);
        let timestamp = timestamp
            .or_else(|| file_modified_at(path))
            .unwrap_or_else(Utc::now);

        let mut note = Note::new();
        if let Some(id) = id {
            note.id = id;
        }
        note.content = content;
        note.created_at = timestamp;
        note.updated_at = timestamp;

        self.repository.persist(&mut note)?;
        archive_file(path, archive_dir)?;

        Ok(note.id)
    }

    /// Extracts the note id and creation timestamp from a legacy
    /// filename. Segment order does not matter: any bracketed segment
    /// that parses as a UUID becomes the id (reused verbatim), and any
    /// that parses as a timestamp becomes the creation time.
    fn parse_filename(&self, path: &Path) -> (Option<String>, Option<DateTime<Utc>>) {
        let name = match path.file_stem().and_then(|s| s.to_str()) {
            Some(name) => name,
            None => return (None, None),
        };

        let mut id = None;
        let mut timestamp = None;

        for capture in self.segment_re.captures_iter(name) {
            let segment = &capture[1];

            if id.is_none() && Uuid::parse_str(segment).is_ok() {
                id = Some(segment.to_string());
            } else if timestamp.is_none() {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(segment, FILENAME_TIMESTAMP) {
                    timestamp = Local
                        .from_local_datetime(&parsed)
                        .earliest()
                        .map(|local| local.with_timezone(&Utc));
                }
            }
        }

        (id, timestamp)
    }

    /// Moves archived files back into the legacy directory. Used to
    /// undo an import by hand; failures are skipped with a warning.
    pub fn restore(&self) -> Result<usize> {
        let archive_dir = self.config.archive_dir();
        if !archive_dir.is_dir() {
            return Ok(0);
        }

        fs::create_dir_all(&self.config.import_dir)?;

        let mut restored = 0;
        for path in legacy_files(&archive_dir) {
            let target = match path.file_name() {
                Some(name) => self.config.import_dir.join(name),
                None => continue,
            };

            match fs::rename(&path, &target) {
                Ok(()) => restored += 1,
                Err(e) => warn!("Failed to restore {}: {}", path.display(), e),
            }
        }

        info!("Restored {} archived files", restored);
        Ok(restored)
    }
}

/// Top-level markdown files in a directory, sorted for deterministic
/// processing order.
fn legacy_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();

    files.sort();
    files
}

fn file_modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Moves a file into the archive directory without ever overwriting:
/// a name collision gets an epoch-seconds suffix before the extension.
fn archive_file(path: &Path, archive_dir: &Path) -> Result<()> {
    let name = path
        .file_name()
        .ok_or_else(|| PlumeError::MigrationFailed {
            message: format!("{} has no file name", path.display()),
        })?;

    let mut target = archive_dir.join(name);
    if target.exists() {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("note");
        let epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        target = archive_dir.join(format!("{}_{}.md", stem, epoch));
    }

    fs::rename(path, &target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataStore;
    use std::io::Write as _;

    fn fixture() -> (tempfile::TempDir, Config, NoteRepository, MigrationService) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("plume.sqlite"),
            import_dir: dir.path().join("notes"),
        };
        fs::create_dir_all(&config.import_dir).unwrap();

        let repository = NoteRepository::new(DataStore::open_in_memory().unwrap());
        let service = MigrationService::new(config.clone(), repository.clone());
        (dir, config, repository, service)
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn expected_utc(timestamp: &str) -> DateTime<Utc> {
        let naive = NaiveDateTime::parse_from_str(timestamp, FILENAME_TIMESTAMP).unwrap();
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn migrates_files_preserving_ids_and_timestamps() {
        let (_dir, config, repository, service) = fixture();
        let id = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

        write_file(
            &config.import_dir,
            &format!("[{}]-[2024-03-05-14-30-00].md", id),
            "# Kept identity\nbody",
        );
        write_file(
            &config.import_dir,
            "[2023-11-20-08-00-00].md",
            "timestamp only",
        );
        write_file(&config.import_dir, "scratchpad.md", "no brackets at all");

        assert!(service.needs_migration());
        let summary = service.migrate().unwrap();

        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.migrated, 3);
        assert!(summary.failed.is_empty());

        let kept = repository.get_note(id).unwrap();
        assert_eq!(kept.title, "Kept identity");
        assert_eq!(kept.created_at, expected_utc("2024-03-05-14-30-00"));
        assert_eq!(kept.updated_at, kept.created_at);

        let notes = repository.list_notes();
        assert_eq!(notes.len(), 3);
        let stamped = notes
            .iter()
            .find(|n| n.content == "timestamp only")
            .unwrap();
        assert_eq!(stamped.created_at, expected_utc("2023-11-20-08-00-00"));

        // Originals moved out of the legacy directory into archived/
        assert!(legacy_files(&config.import_dir).is_empty());
        assert_eq!(legacy_files(&config.archive_dir()).len(), 3);
        assert!(!service.needs_migration());
    }

    #[test]
    fn bracketless_filename_gets_fresh_id_and_file_mtime() {
        let (_dir, config, repository, service) = fixture();
        let path = write_file(&config.import_dir, "plain.md", "loose thoughts");
        let mtime = file_modified_at(&path).unwrap();

        service.migrate().unwrap();

        let notes = repository.list_notes();
        assert_eq!(notes.len(), 1);
        assert!(Uuid::parse_str(&notes[0].id).is_ok());
        assert_eq!(notes[0].created_at, mtime);
    }

    #[test]
    fn archive_collision_gets_a_suffix_instead_of_overwriting() {
        let (_dir, config, _repository, service) = fixture();

        fs::create_dir_all(config.archive_dir()).unwrap();
        write_file(&config.archive_dir(), "clash.md", "already archived");
        write_file(&config.import_dir, "clash.md", "new arrival");

        let summary = service.migrate().unwrap();
        assert_eq!(summary.migrated, 1);

        let archived = legacy_files(&config.archive_dir());
        assert_eq!(archived.len(), 2);
        assert!(archived
            .iter()
            .any(|p| p.file_name().unwrap() != "clash.md"));
        assert_eq!(
            fs::read_to_string(config.archive_dir().join("clash.md")).unwrap(),
            "already archived"
        );
    }

    #[test]
    fn needs_migration_is_false_without_candidates_or_with_existing_notes() {
        let (_dir, config, repository, service) = fixture();

        // Empty legacy directory
        assert!(!service.needs_migration());

        // Missing legacy directory
        fs::remove_dir_all(&config.import_dir).unwrap();
        assert!(!service.needs_migration());

        // Candidates present but the store already holds notes
        fs::create_dir_all(&config.import_dir).unwrap();
        write_file(&config.import_dir, "candidate.md", "content");
        repository.create_note("pre-existing");
        assert!(!service.needs_migration());
    }

    #[test]
    fn restore_moves_archived_files_back() {
        let (_dir, config, _repository, service) = fixture();
        write_file(&config.import_dir, "a.md", "first");
        write_file(&config.import_dir, "b.md", "second");

        service.migrate().unwrap();
        assert!(legacy_files(&config.import_dir).is_empty());

        let restored = service.restore().unwrap();
        assert_eq!(restored, 2);
        assert_eq!(legacy_files(&config.import_dir).len(), 2);
        assert!(legacy_files(&config.archive_dir()).is_empty());
    }

    #[test]
    fn restore_is_a_noop_without_an_archive() {
        let (_dir, _config, _repository, service) = fixture();
        assert_eq!(service.restore().unwrap(), 0);
    }
}
