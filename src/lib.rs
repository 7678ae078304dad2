//! A to-do list kept in a local SQLite database: tasks with optional
//! deadlines, subtasks, completion status, search and overdue reminders.

pub mod cli;
pub mod config;
pub mod error;
pub mod interface;
pub mod logging;
pub mod model;
pub mod schema;
pub mod store;

pub use config::{Config, StoreConfig};
pub use error::{Result, StoreError};
pub use model::{Status, Subtask, Task};
pub use store::Store;
