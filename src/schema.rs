//! Schema creation and additive migration of the task database.
//!
//! A table missing one of its columns is rebuilt: create `<name>_new` with the
//! full layout, copy the shared columns across, drop the old table and rename
//! the new one into place. The whole run happens in one transaction with
//! foreign keys switched off, so dropping `tasks` does not cascade into
//! `sub_tasks`.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

/// Target layout of one table and the column whose absence triggers a rebuild.
struct TableSchema {
    name: &'static str,
    temp_name: &'static str,
    columns: &'static [&'static str],
    required_column: &'static str,
    create: fn(&str) -> String,
}

const TASKS: TableSchema = TableSchema {
    name: "tasks",
    temp_name: "tasks_new",
    columns: &["id", "description", "status", "deadline", "created_at"],
    required_column: "created_at",
    create: create_tasks_sql,
};

const SUB_TASKS: TableSchema = TableSchema {
    name: "sub_tasks",
    temp_name: "sub_tasks_new",
    columns: &["id", "task_id", "description", "status", "created_at"],
    required_column: "status",
    create: create_sub_tasks_sql,
};

fn create_tasks_sql(name: &str) -> String {
    format!(
        "CREATE TABLE {} (
                  id          INTEGER PRIMARY KEY AUTOINCREMENT,
                  description TEXT NOT NULL,
                  status      INTEGER DEFAULT 0,
                  deadline    TEXT,
                  created_at  TEXT DEFAULT CURRENT_TIMESTAMP
                  )",
        name
    )
}

fn create_sub_tasks_sql(name: &str) -> String {
    format!(
        "CREATE TABLE {} (
                  id          INTEGER PRIMARY KEY AUTOINCREMENT,
                  task_id     INTEGER,
                  description TEXT NOT NULL,
                  status      INTEGER DEFAULT 0,
                  created_at  TEXT DEFAULT CURRENT_TIMESTAMP,
                  FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
                  )",
        name
    )
}

/// Create missing tables and bring existing ones up to date. Safe to run on
/// every start. Leaves the connection with foreign keys enabled.
pub fn init_schema(conn: &mut Connection) -> Result<()> {
    // Must be set outside of a transaction to take effect.
    conn.pragma_update(None, "foreign_keys", "OFF")
        .map_err(|e| StoreError::migration("schema", e))?;

    let result = migrate(conn);

    let restored = conn.pragma_update(None, "foreign_keys", "ON");
    result?;
    restored.map_err(|e| StoreError::migration("schema", e))?;

    debug!("Schema is up to date");
    Ok(())
}

fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| StoreError::migration("schema", e))?;

    for table in [&TASKS, &SUB_TASKS] {
        ensure_table(&tx, table).map_err(|e| StoreError::migration(table.name, e))?;
    }

    let orphans = foreign_key_violations(&tx).map_err(|e| StoreError::migration("sub_tasks", e))?;
    if orphans > 0 {
        warn!(orphans, "Subtasks reference tasks that do not exist");
    }

    // Dropping `tx` without committing rolls every step back.
    tx.commit().map_err(|e| StoreError::migration("schema", e))?;
    Ok(())
}

fn ensure_table(tx: &Transaction, table: &TableSchema) -> rusqlite::Result<()> {
    if table_exists(tx, table.temp_name)? {
        warn!(table = table.temp_name, "Dropping leftover migration table");
        tx.execute_batch(&format!("DROP TABLE {}", table.temp_name))?;
    }

    if !table_exists(tx, table.name)? {
        info!(table = table.name, "Creating table");
        tx.execute_batch(&(table.create)(table.name))?;
        return Ok(());
    }

    let existing = table_columns(tx, table.name)?;
    if existing.iter().any(|c| c == table.required_column) {
        return Ok(());
    }

    info!(
        table = table.name,
        column = table.required_column,
        "Rebuilding table to add missing column"
    );
    tx.execute_batch(&(table.create)(table.temp_name))?;

    let shared = table
        .columns
        .iter()
        .copied()
        .filter(|column| existing.iter().any(|c| c == column))
        .collect::<Vec<_>>()
        .join(", ");
    let copied = tx.execute(
        &format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            table.temp_name, shared, shared, table.name
        ),
        [],
    )?;

    tx.execute_batch(&format!(
        "DROP TABLE {}; ALTER TABLE {} RENAME TO {};",
        table.name, table.temp_name, table.name
    ))?;
    info!(table = table.name, rows = copied, "Table rebuilt");
    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let found = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn table_columns(conn: &Connection, name: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map(params![name], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn foreign_key_violations(conn: &Connection) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let rows = stmt
        .query_map([], |_| Ok(()))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn creates_both_tables_on_empty_database() {
        let mut conn = memory();
        init_schema(&mut conn).unwrap();
        assert_eq!(
            table_columns(&conn, "tasks").unwrap(),
            vec!["id", "description", "status", "deadline", "created_at"]
        );
        assert_eq!(
            table_columns(&conn, "sub_tasks").unwrap(),
            vec!["id", "task_id", "description", "status", "created_at"]
        );
    }

    #[test]
    fn leaves_foreign_keys_enabled() {
        let mut conn = memory();
        init_schema(&mut conn).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut conn = memory();
        init_schema(&mut conn).unwrap();
        conn.execute("INSERT INTO tasks (description) VALUES ('keep me')", [])
            .unwrap();
        init_schema(&mut conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM tasks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn table_exists_reports_missing_tables() {
        let conn = memory();
        assert!(!table_exists(&conn, "tasks").unwrap());
        conn.execute("CREATE TABLE tasks (id INTEGER)", []).unwrap();
        assert!(table_exists(&conn, "tasks").unwrap());
    }
}
