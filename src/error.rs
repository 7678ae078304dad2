//! Errors raised by the task store.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while talking to the task database.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened or configured.
    #[error("Failed to open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Creating or migrating a table failed. The transaction was rolled back.
    #[error("Failed to migrate table {table}: {source}")]
    Migration {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A statement broke a constraint, e.g. a subtask without a parent task.
    #[error("Constraint violation: {0}")]
    Constraint(#[source] rusqlite::Error),

    /// Any other statement failure.
    #[error("Database error: {0}")]
    Statement(#[source] rusqlite::Error),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl StoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn migration(table: &str, source: rusqlite::Error) -> Self {
        StoreError::Migration {
            table: table.to_string(),
            source,
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, StoreError::Constraint(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => StoreError::Constraint(err),
            _ => StoreError::Statement(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
