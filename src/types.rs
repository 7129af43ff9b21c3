//! Shared types for the plume note store.
//!
//! This module contains the crate-wide result alias, the migration
//! outcome summary, and the CLI subcommand definitions.

use std::path::PathBuf;

use clap::Subcommand;

use crate::PlumeError;

/// A specialized Result type for plume operations.
pub type Result<T> = std::result::Result<T, PlumeError>;

/// Summary of a legacy file migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationSummary {
    /// Total number of candidate files found in the legacy location
    pub total_files: usize,
    /// Number of files fully migrated (persisted and archived)
    pub migrated: usize,
    /// Details about files that were skipped
    pub failed: Vec<(PathBuf, String)>, // (file path, error message)
}

/// Available subcommands for the plume application
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    New {
        /// Initial content of the note
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the note's initial content
        #[clap(short, long)]
        file: Option<PathBuf>,
    },

    /// View a note by ID
    View {
        /// ID of the note to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List the most recently updated notes
    List {
        /// Limit the number of notes returned
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Search notes by title or content
    Search {
        /// Search query text
        query: String,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List notes created on a given day
    Today {
        /// Day to list, as YYYY-MM-DD (defaults to today)
        date: Option<String>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Show daily usage counters
    Stats {
        /// Day to show, as YYYY-MM-DD (defaults to today)
        date: Option<String>,
    },

    /// Import legacy markdown notes into the store
    Migrate {
        /// Move archived files back to the legacy location instead
        #[clap(long)]
        restore: bool,
    },
}
