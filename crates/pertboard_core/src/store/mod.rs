//! External store contract and materialized record types.
//!
//! # Responsibility
//! - Define the synchronous persist/fetch surface the core consumes.
//! - Define the wire-agnostic records exchanged with the store.
//!
//! # Invariants
//! - Records carry store identities only; session handles never leave the
//!   process.
//! - `fetch_snapshot` returns the complete graph for one project; partial
//!   reads are not part of the contract.

use crate::db::DbError;
use crate::model::item::StoreId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Result type used by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from external store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// The store rejected a write (uniqueness or referential constraint).
    Constraint(String),
    /// Target row does not exist in the store.
    NotFound(StoreId),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Constraint(message) => write!(f, "store rejected write: {message}"),
            Self::NotFound(id) => write!(f, "store row not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Materialized project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub store_id: StoreId,
    pub name: String,
    pub start_date: i64,
    pub end_date: Option<i64>,
    pub description: String,
    pub created_at: i64,
    pub creator: Option<String>,
    pub likely_duration: i32,
    pub min_duration: i32,
    pub max_duration: i32,
}

/// Materialized task row plus its link tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub store_id: StoreId,
    pub project_id: StoreId,
    pub name: String,
    pub start_date: i64,
    pub end_date: Option<i64>,
    pub description: String,
    pub created_at: i64,
    pub creator: Option<String>,
    pub likely_duration: i32,
    pub min_duration: i32,
    pub max_duration: i32,
    /// Dense position in the project's flattened sequence.
    pub order_index: i64,
    /// Structural parent by store identity, if any.
    pub parent_id: Option<StoreId>,
    /// Store identities of tasks this one blocks.
    pub dependencies: Vec<StoreId>,
    /// Assigned worker usernames.
    pub workers: Vec<String>,
}

/// Complete materialized graph for one project, as returned by a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: ProjectRecord,
    pub tasks: Vec<TaskRecord>,
}

/// Synchronous persistence surface consumed by commands and the
/// reconciliation gateway.
///
/// Implementations must be safe to call between commands only; the core
/// never issues concurrent calls.
pub trait ProjectStore {
    /// Persists a new project and returns its assigned identity.
    fn create_project(&mut self, record: &ProjectRecord) -> StoreResult<StoreId>;

    /// Updates a persisted project's fields.
    fn update_project(&mut self, record: &ProjectRecord) -> StoreResult<()>;

    /// Persists a new task and returns its assigned identity.
    fn create_task(&mut self, record: &TaskRecord) -> StoreResult<StoreId>;

    /// Updates a persisted task's fields and order index.
    fn update_task(&mut self, record: &TaskRecord) -> StoreResult<()>;

    /// Updates only the order index of a persisted task.
    fn update_task_row(&mut self, task: StoreId, order_index: i64) -> StoreResult<()>;

    /// Re-points a persisted task's parent link.
    fn set_parent_link(&mut self, task: StoreId, parent: Option<StoreId>) -> StoreResult<()>;

    /// Deletes a persisted task and its link rows.
    fn delete_task(&mut self, task: StoreId) -> StoreResult<()>;

    /// Records that `dependent` cannot start until `blocker` finishes.
    fn add_dependency_link(&mut self, blocker: StoreId, dependent: StoreId) -> StoreResult<()>;

    fn remove_dependency_link(&mut self, blocker: StoreId, dependent: StoreId) -> StoreResult<()>;

    fn add_worker_link(&mut self, task: StoreId, worker: &str) -> StoreResult<()>;

    fn remove_worker_link(&mut self, task: StoreId, worker: &str) -> StoreResult<()>;

    /// Materializes the full graph for one project.
    fn fetch_snapshot(&mut self, project: StoreId) -> StoreResult<ProjectSnapshot>;
}
