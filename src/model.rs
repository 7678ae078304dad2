use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;

use crate::error::{Result, StoreError};

/// Format of deadlines and of the timestamps handed to the overdue check.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Completion state shared by tasks and subtasks. Stored as 0 / 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Incomplete,
    Complete,
}

/// A top-level to-do item, saved as an entry in the tasks table.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub status: Status,
    pub deadline: Option<String>,
    /// Unset for legacy rows with a missing or unreadable timestamp.
    pub created_at: Option<NaiveDateTime>,
}

/// A child item, saved in the sub_tasks table. It always belongs to one task.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub description: String,
    pub status: Status,
    pub created_at: Option<NaiveDateTime>,
}

impl Status {
    pub fn as_i64(self) -> i64 {
        match self {
            Status::Incomplete => 0,
            Status::Complete => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Status> {
        match value {
            0 => Some(Status::Incomplete),
            1 => Some(Status::Complete),
            _ => None,
        }
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

// Anything non-zero counts as done. Legacy rows may carry a NULL status;
// they were never completed.
impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null | ValueRef::Integer(0) => Ok(Status::Incomplete),
            ValueRef::Integer(_) => Ok(Status::Complete),
            ValueRef::Real(r) if r == 0.0 => Ok(Status::Incomplete),
            ValueRef::Real(_) => Ok(Status::Complete),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == Status::Complete
    }

    /// Whether the deadline has passed while the task is still open.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        match &self.deadline {
            Some(deadline) if !self.is_done() => deadline.as_str() < format_timestamp(now).as_str(),
            _ => false,
        }
    }
}

impl Subtask {
    pub fn is_done(&self) -> bool {
        self.status == Status::Complete
    }
}

/// Return a task from a row in this order: [id, description, status,
/// deadline, created_at]
pub fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        description: row.get(1)?,
        status: row.get(2)?,
        deadline: row.get(3)?,
        created_at: read_created_at(row, 4)?,
    })
}

/// Return a subtask from a row in this order: [id, task_id, description,
/// status, created_at]
pub fn subtask_from_row(row: &Row) -> rusqlite::Result<Subtask> {
    Ok(Subtask {
        id: row.get(0)?,
        task_id: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        created_at: read_created_at(row, 4)?,
    })
}

/// Read a `created_at` column. NULL, or anything that is not a timestamp,
/// becomes `None` instead of failing the whole query.
fn read_created_at(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let text = match row.get_ref(idx)? {
        ValueRef::Text(text) => std::str::from_utf8(text).ok(),
        _ => None,
    };
    Ok(text.and_then(|text| {
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
    }))
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|e| {
        StoreError::validation(
            "timestamp",
            format!("'{}' is not in YYYY-MM-DD HH:MM:SS form ({})", value, e),
        )
    })
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Return the current local time, with seconds precision
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
