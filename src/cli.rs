//! CLI module for the plume application
//!
//! This module handles the command-line interface for interacting with the
//! note persistence core.
use std::{
    fs::read_to_string,
    io::{stdin, stdout, Write},
    path::PathBuf,
};

use chrono::{Local, NaiveDate};
use console::style;
use log::info;

use crate::{
    Commands, Config, DailyStats, MigrationService, Note, NoteRepository, PlumeError, Result,
    SearchEngine,
};

/// CLI application handler - processes CLI commands against the note core
pub struct App {
    /// CRUD, autosave, and statistics surface
    repository: NoteRepository,

    /// Ranked full-text query surface
    search: SearchEngine,

    /// Legacy loose-file importer
    migration: MigrationService,
}

impl App {
    /// Create a new CLI application over the shared note core
    pub fn new(repository: NoteRepository, search: SearchEngine, config: Config) -> Self {
        let migration = MigrationService::new(config, repository.clone());

        Self {
            repository,
            search,
            migration,
        }
    }

    /// Run the CLI application with the given command
    pub fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::New { content, file } => self.handle_new(content, file)?,

            Commands::View { id, json } => self.handle_view(id, json)?,

            Commands::List { limit, json } => self.handle_list(limit, json)?,

            Commands::Search { query, json } => self.handle_search(query, json)?,

            Commands::Today { date, json } => self.handle_today(date, json)?,

            Commands::Delete { id, force } => self.handle_delete(id, force)?,

            Commands::Stats { date } => self.handle_stats(date)?,

            Commands::Migrate { restore } => self.handle_migrate(restore)?,
        }

        Ok(())
    }

    fn handle_new(&self, content: Option<String>, file: Option<PathBuf>) -> Result<()> {
        let content = match (content, file) {
            (Some(text), _) => text,
            (None, Some(path)) => read_to_string(path)?,
            (None, None) => String::new(),
        };

        let note = self.repository.create_note(&content);
        self.repository.track_note_created();
        if note.word_count > 0 {
            self.repository.track_words_written(note.word_count);
        }

        println!("Created note {}", style(&note.id).green());
        println!("Title: {}", style(&note.title).bold());
        Ok(())
    }

    fn handle_view(&self, id: String, json: bool) -> Result<()> {
        let note = self
            .repository
            .get_note(&id)
            .ok_or(PlumeError::NoteNotFound { id })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
        } else {
            println!("{}", style(&note.title).bold());
            println!(
                "ID: {} | Words: {} | Updated: {}",
                note.id,
                note.word_count,
                note.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            );
            println!();
            println!("{}", note.content);
        }

        Ok(())
    }

    fn handle_list(&self, limit: usize, json: bool) -> Result<()> {
        let notes = self.search.recent_notes(limit);
        self.display_notes(&notes, json)
    }

    fn handle_search(&self, query: String, json: bool) -> Result<()> {
        let results = self.search.search(&query);
        self.display_notes(&results, json)
    }

    fn handle_today(&self, date: Option<String>, json: bool) -> Result<()> {
        let day = parse_day(date)?;
        let notes = self.search.notes_for_date(day);
        self.display_notes(&notes, json)
    }

    fn handle_delete(&self, id: String, force: bool) -> Result<()> {
        let note = self
            .repository
            .get_note(&id)
            .ok_or(PlumeError::NoteNotFound { id })?;

        if !force {
            println!("You are about to delete the following note:");
            println!("ID:     {}", note.id);
            println!("Title:  {}", note.title);
            println!(
                "Created: {}",
                note.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush().map_err(PlumeError::Io)?;

            let mut input = String::new();
            stdin().read_line(&mut input).map_err(PlumeError::Io)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        self.repository.delete(&note);
        println!("Deleted note {}", style(&note.id).red());
        Ok(())
    }

    fn handle_stats(&self, date: Option<String>) -> Result<()> {
        let day = match date {
            Some(text) => parse_day(Some(text))?.format("%Y-%m-%d").to_string(),
            None => DailyStats::today_key(),
        };

        match self.repository.daily_stats(&day) {
            Some(stats) => {
                println!("Activity for {}", style(&stats.date).bold());
                println!("Words written:  {}", stats.words_written);
                println!("Notes created:  {}", stats.notes_created);
                println!("Notes updated:  {}", stats.notes_updated);
                println!("Active minutes: {}", stats.active_minutes);
                println!("AI actions:     {}", stats.ai_actions_used);
            }
            None => println!("No recorded activity for {}", day),
        }

        Ok(())
    }

    fn handle_migrate(&self, restore: bool) -> Result<()> {
        if restore {
            let restored = self.migration.restore()?;
            println!("Restored {} archived files", restored);
            return Ok(());
        }

        if !self.migration.needs_migration() {
            println!("Nothing to migrate.");
            return Ok(());
        }

        let summary = self.migration.migrate()?;
        self.repository.reload();

        println!(
            "Imported {} of {} files",
            style(summary.migrated).green(),
            summary.total_files
        );
        for (path, reason) in &summary.failed {
            println!("{} {}: {}", style("skipped").yellow(), path.display(), reason);
        }

        Ok(())
    }

    fn display_notes(&self, notes: &[Note], json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!("No notes found.");
            return Ok(());
        }

        for note in notes {
            println!(
                "{}  {}  {}",
                note.id,
                note.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                style(&note.title).bold()
            );
        }

        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );

        Ok(())
    }
}

/// Parses a `YYYY-MM-DD` argument, defaulting to the current local day.
fn parse_day(date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(text) => {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| PlumeError::ApplicationError {
                message: format!("invalid date {:?}, expected YYYY-MM-DD", text),
            })
        }
        None => Ok(Local::now().date_naive()),
    }
}

/// Runs the one-time legacy import on startup if it has never happened.
pub fn run_startup_migration(app_config: &Config, repository: &NoteRepository) {
    let migration = MigrationService::new(app_config.clone(), repository.clone());
    if !migration.needs_migration() {
        return;
    }

    info!("Legacy notes detected, running one-time import");
    match migration.migrate() {
        Ok(summary) => {
            info!(
                "Imported {} of {} legacy files",
                summary.migrated, summary.total_files
            );
            repository.reload();
        }
        Err(e) => {
            log::error!("Legacy import failed: {}", e);
        }
    }
}
