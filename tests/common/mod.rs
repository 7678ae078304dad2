//! Test fixtures: a store backed by a database in a temporary directory.

#![allow(dead_code)]

use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;
use todolist::{Store, StoreConfig};

/// Temporary database directory, removed when the fixture is dropped.
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        todolist::logging::init_test_logging();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("tasks.db");
        Self { temp_dir, db_path }
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::new(&self.db_path)
    }

    /// Open the store, creating or migrating the schema.
    pub fn store(&self) -> Store {
        Store::open(self.config()).expect("failed to open store")
    }

    /// A raw connection, for seeding legacy layouts and inspecting tables.
    pub fn raw(&self) -> Connection {
        Connection::open(&self.db_path).expect("failed to open database")
    }

    pub fn columns(&self, table: &str) -> Vec<String> {
        let conn = self.raw();
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .unwrap();
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        columns
    }

    pub fn table_exists(&self, table: &str) -> bool {
        let count: i64 = self
            .raw()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
