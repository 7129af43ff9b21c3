use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::{error, info};

use plume::{
    run_startup_migration, App, Commands, Config, DataStore, NoteRepository, SearchEngine,
};

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    version,
    about = "Local-first note store with full-text search"
)]
struct Cli {
    /// Path to the SQLite database file
    #[clap(long, value_parser)]
    database: Option<PathBuf>,

    /// Path to the legacy notes directory for the one-time import
    #[clap(long, value_parser)]
    import_dir: Option<PathBuf>,

    /// Subcommands for the plume application
    #[clap(subcommand)]
    command: Commands,
}

fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();
}

#[tokio::main]
async fn main() {
    initialize_logger();
    info!("Application starting up");

    let cli = Cli::parse();

    let mut config = match Config::from_default_locations() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to resolve application directories: {}", e);
            exit(1);
        }
    };
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(import_dir) = cli.import_dir {
        config.import_dir = import_dir;
    }

    // An unusable store means nothing else can work
    let store = match DataStore::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open note database: {}", e);
            exit(1);
        }
    };

    let repository = NoteRepository::new(store.clone());
    run_startup_migration(&config, &repository);

    let search = SearchEngine::new(store);
    let app = App::new(repository, search, config);

    if let Err(e) = app.run(cli.command) {
        error!("{}", e);
        exit(1);
    }

    info!("Application shutting down");
}
