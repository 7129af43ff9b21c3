use std::path::{Path, PathBuf};

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};

use crate::{PlumeError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Legacy directory of loose markdown notes for the one-time import
    pub import_dir: PathBuf,
}

impl Config {
    /// Resolves platform-default locations for the database and the
    /// legacy import directory.
    pub fn from_default_locations() -> Result<Self> {
        let project =
            ProjectDirs::from("", "", "plume").ok_or_else(|| PlumeError::ApplicationError {
                message: "could not determine a data directory for this platform".to_string(),
            })?;

        let documents = UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Config {
            database_path: project.data_dir().join("plume.sqlite"),
            import_dir: documents.join("Plume"),
        })
    }

    /// Directory that migrated originals are moved into
    pub fn archive_dir(&self) -> PathBuf {
        self.import_dir.join("archived")
    }
}
