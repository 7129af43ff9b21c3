//! Local-first note persistence core
//!
//! This library provides durable SQLite-backed note storage with a
//! synchronized full-text index, a repository with debounced autosave
//! and daily usage statistics, ranked search with a substring fallback,
//! and a one-time import of legacy loose-file notes.

mod cli;
mod config;
mod errors;
mod migration;
mod note;
mod repository;
mod search;
mod store;
mod types;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use migration::*;
pub use note::*;
pub use repository::*;
pub use search::*;
pub use store::*;
pub use types::*;
