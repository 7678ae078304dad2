//! Durable storage for tasks and subtasks.
//!
//! Every operation opens its own connection, runs in its own transaction and
//! releases the connection before returning, on success and on error alike.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, error};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::model::{self, subtask_from_row, task_from_row, Status, Subtask, Task};
use crate::schema;

const TASK_COLUMNS: &str = "id, description, status, deadline, created_at";
const SUBTASK_COLUMNS: &str = "id, task_id, description, status, created_at";

/// Handle to the task database.
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
}

impl Store {
    /// Open the store described by `config` and bring its schema up to date.
    pub fn open(config: StoreConfig) -> Result<Store> {
        let store = Store { config };
        store.init_schema()?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create or migrate the tables. Idempotent.
    pub fn init_schema(&self) -> Result<()> {
        self.with_connection("init_schema", schema::init_schema)
    }

    /// Add an incomplete task. `deadline` must be `YYYY-MM-DD HH:MM:SS`.
    pub fn add_task(&self, description: &str, deadline: Option<&str>) -> Result<Task> {
        check_description(description)?;
        let deadline = deadline
            .map(|d| model::parse_timestamp(d).map(model::format_timestamp))
            .transpose()?;

        self.with_transaction("add_task", |tx| {
            tx.execute(
                "INSERT INTO tasks (description, status, deadline) VALUES (?1, ?2, ?3)",
                params![description, Status::Incomplete, deadline],
            )?;
            let task = fetch_task(tx, tx.last_insert_rowid())?;
            debug!(id = task.id, "Task added");
            Ok(task)
        })
    }

    /// Set the status of a task. Returns whether a task with that id exists;
    /// an unknown id is not an error.
    pub fn update_task_status(&self, task_id: i64, status: Status) -> Result<bool> {
        self.with_transaction("update_task_status", |tx| {
            let changed = tx.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status, task_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Remove a task. Its subtasks go with it through the cascading foreign key.
    pub fn delete_task(&self, task_id: i64) -> Result<bool> {
        self.with_transaction("delete_task", |tx| {
            let deleted = tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(deleted > 0)
        })
    }

    /// All tasks, newest first.
    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        self.with_connection("load_tasks", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks ORDER BY created_at DESC, id DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map([], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Tasks whose description contains `term`, newest first. The match is
    /// case-sensitive and `%` or `_` are taken literally. An empty term
    /// matches every task.
    pub fn search_tasks(&self, term: &str) -> Result<Vec<Task>> {
        self.with_connection("search_tasks", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE instr(description, ?1) > 0 \
                 ORDER BY created_at DESC, id DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![term], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Add an incomplete subtask under `task_id`. Fails with a constraint
    /// violation when the task does not exist.
    pub fn add_subtask(&self, task_id: i64, description: &str) -> Result<Subtask> {
        check_description(description)?;

        self.with_transaction("add_subtask", |tx| {
            tx.execute(
                "INSERT INTO sub_tasks (task_id, description, status) VALUES (?1, ?2, ?3)",
                params![task_id, description, Status::Incomplete],
            )?;
            let subtask = tx.query_row(
                &format!("SELECT {} FROM sub_tasks WHERE id = ?1", SUBTASK_COLUMNS),
                params![tx.last_insert_rowid()],
                subtask_from_row,
            )?;
            debug!(id = subtask.id, task_id, "Subtask added");
            Ok(subtask)
        })
    }

    /// Subtasks of one task, oldest first.
    pub fn load_subtasks(&self, task_id: i64) -> Result<Vec<Subtask>> {
        self.with_connection("load_subtasks", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM sub_tasks WHERE task_id = ?1 ORDER BY created_at ASC, id ASC",
                SUBTASK_COLUMNS
            ))?;
            let subtasks = stmt
                .query_map(params![task_id], subtask_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(subtasks)
        })
    }

    /// Set the status of a subtask. Same contract as `update_task_status`.
    pub fn update_subtask_status(&self, subtask_id: i64, status: Status) -> Result<bool> {
        self.with_transaction("update_subtask_status", |tx| {
            let changed = tx.execute(
                "UPDATE sub_tasks SET status = ?1 WHERE id = ?2",
                params![status, subtask_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Descriptions of incomplete tasks whose deadline is before `now`.
    pub fn check_overdue(&self, now: NaiveDateTime) -> Result<Vec<String>> {
        let now = model::format_timestamp(now);
        self.with_connection("check_overdue", |conn| {
            let mut stmt = conn.prepare(
                "SELECT description FROM tasks \
                 WHERE deadline IS NOT NULL AND deadline < ?1 AND COALESCE(status, 0) = ?2 \
                 ORDER BY deadline ASC, id ASC",
            )?;
            let overdue = stmt
                .query_map(params![now, Status::Incomplete], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(overdue)
        })
    }

    fn connect(&self) -> Result<Connection> {
        let path = &self.config.db_path;
        let open = || -> rusqlite::Result<Connection> {
            let conn = Connection::open(path)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(conn)
        };
        open().map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })
    }

    /// Run `f` on a fresh connection. The connection is closed when this
    /// returns, whatever the outcome.
    fn with_connection<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        debug!(op, "Running store operation");
        let result = self.connect().and_then(|mut conn| f(&mut conn));
        if let Err(e) = &result {
            error!(op, error = %e, "Store operation failed");
        }
        result
    }

    /// Like `with_connection`, inside a transaction that is committed only
    /// when `f` succeeds.
    fn with_transaction<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        self.with_connection(op, |conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

fn fetch_task(conn: &Connection, id: i64) -> rusqlite::Result<Task> {
    conn.query_row(
        &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
        params![id],
        task_from_row,
    )
}

fn check_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(StoreError::validation(
            "description",
            "a description cannot be empty",
        ));
    }
    Ok(())
}
