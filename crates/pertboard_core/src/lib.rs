//! Core domain logic for PertBoard.
//! This crate is the single source of truth for ordering and undo invariants.

pub mod command;
pub mod db;
pub mod history;
pub mod logging;
pub mod model;
pub mod order;
pub mod reconcile;
pub mod store;

pub use command::{
    AddDependencyCmd, AssignWorkerCmd, Command, CommandError, CommandResult, CreateTaskCmd,
    DeleteTaskCmd, EditProjectCmd, EditTaskCmd, ItemEdit, MoveTaskCmd, RemoveDependencyCmd,
    UnassignWorkerCmd, ValidationError,
};
pub use history::CommandHistory;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::event::{ModelEvent, ModelSubscriber, SubscriptionId};
pub use model::item::{is_persisted, ItemFields, ItemValidationError, StoreId, TRANSIENT_ID};
pub use model::project::{Project, ProjectModel};
pub use model::task::{Task, TaskHandle};
pub use db::{open_db, open_db_in_memory};
pub use reconcile::{apply_refresh, assign_identity, persist_project, RefreshOutcome};
pub use store::{
    ProjectRecord, ProjectSnapshot, ProjectStore, SqliteStore, StoreError, StoreResult, TaskRecord,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
