use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the database inside the platform data directory.
pub const DEFAULT_DB_FILE: &str = "tasks.db";

/// How often `watch` re-checks for overdue tasks.
pub const DEFAULT_OVERDUE_INTERVAL: Duration = Duration::from_secs(60);

/// Where the store keeps its data. Handed to `Store::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        StoreConfig {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }
}

/// Application settings resolved from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub overdue_interval: Duration,
}

impl Config {
    /// Use the given database file, or fall back to the one in the
    /// platform data directory.
    pub fn resolve(db_file: Option<PathBuf>) -> anyhow::Result<Config> {
        let db_path = match db_file {
            Some(path) => path,
            None => default_db_path()?,
        };
        Ok(Config {
            store: StoreConfig::new(db_path),
            overdue_interval: DEFAULT_OVERDUE_INTERVAL,
        })
    }
}

/// Find the default database file, creating its directory if it does
/// not exist.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base_dirs = ProjectDirs::from("com", "gozque", "todolist")
        .ok_or_else(|| anyhow!("Failed to find a data directory for the task database."))?;
    let root_dir = base_dirs.data_dir();
    if !root_dir.exists() {
        std::fs::create_dir_all(root_dir)
            .with_context(|| format!("Failed to create directory {}.", root_dir.display()))?;
    }
    Ok(root_dir.join(DEFAULT_DB_FILE))
}
