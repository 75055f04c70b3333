//! Reversible mutation commands over the entity model.
//!
//! # Responsibility
//! - Define the command contract (execute/undo plus reconciliation hooks).
//! - Provide the concrete task/project/dependency/worker commands.
//!
//! # Invariants
//! - A failed `execute` leaves the model exactly as it was; preconditions
//!   are checked and store writes issued before any field is touched.
//! - Commands reference entities by arena handle, so identity reassignment
//!   never invalidates a command's internal references.
//! - `undo` after `execute` restores every field the command touched.

use crate::model::item::{ItemFields, ItemValidationError, StoreId};
use crate::model::project::{Project, ProjectModel};
use crate::model::task::{Task, TaskHandle};
use crate::store::{ProjectRecord, ProjectStore, StoreError, TaskRecord};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dependency;
pub mod project;
pub mod task;
pub mod worker;

pub use dependency::{AddDependencyCmd, RemoveDependencyCmd};
pub use project::EditProjectCmd;
pub use task::{CreateTaskCmd, DeleteTaskCmd, EditTaskCmd, MoveTaskCmd};
pub use worker::{AssignWorkerCmd, UnassignWorkerCmd};

/// Result type used by command execution.
pub type CommandResult = Result<(), CommandError>;

/// Precondition failures detected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field-level rule violation.
    Item(ItemValidationError),
    /// Task name is already taken within the project.
    DuplicateTaskName(String),
    /// Referenced task is not in the model.
    MissingTask(TaskHandle),
    /// Requested parent task is not in the model.
    MissingParent(TaskHandle),
    /// The dependency edge already exists.
    DependencyExists {
        blocker: TaskHandle,
        dependent: TaskHandle,
    },
    /// The dependency edge does not exist.
    DependencyMissing {
        blocker: TaskHandle,
        dependent: TaskHandle,
    },
    /// A task cannot block itself.
    SelfDependency(TaskHandle),
    /// Worker is already assigned to the task.
    WorkerAlreadyAssigned(String),
    /// Worker is not assigned to the task.
    WorkerNotAssigned(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Item(err) => write!(f, "{err}"),
            Self::DuplicateTaskName(name) => {
                write!(f, "task name `{name}` is already taken in this project")
            }
            Self::MissingTask(handle) => write!(f, "task {handle} is not in the model"),
            Self::MissingParent(handle) => write!(f, "parent task {handle} is not in the model"),
            Self::DependencyExists { blocker, dependent } => {
                write!(f, "dependency {blocker} -> {dependent} already exists")
            }
            Self::DependencyMissing { blocker, dependent } => {
                write!(f, "dependency {blocker} -> {dependent} does not exist")
            }
            Self::SelfDependency(handle) => write!(f, "task {handle} cannot depend on itself"),
            Self::WorkerAlreadyAssigned(worker) => {
                write!(f, "worker `{worker}` is already assigned")
            }
            Self::WorkerNotAssigned(worker) => write!(f, "worker `{worker}` is not assigned"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Item(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for ValidationError {
    fn from(value: ItemValidationError) -> Self {
        Self::Item(value)
    }
}

/// Errors surfaced by command execution.
#[derive(Debug)]
pub enum CommandError {
    /// Rejected before mutation; model and history are untouched.
    Validation(ValidationError),
    /// The store rejected the write; the in-memory mutation was rolled back.
    Persistence(StoreError),
    /// The ordering engine rejected a move into the task's own group.
    OrderingConstraint,
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::OrderingConstraint => {
                write!(f, "cannot move a task into its own group")
            }
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::OrderingConstraint => None,
        }
    }
}

impl From<ValidationError> for CommandError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ItemValidationError> for CommandError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(ValidationError::Item(value))
    }
}

impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value)
    }
}

/// A reversible mutation against the entity model and backing store.
///
/// Only a successful `execute` is pushed onto history; the reconciliation
/// hooks keep live commands valid across identity upgrades and refreshes.
pub trait Command {
    /// Short stable name for history logging.
    fn label(&self) -> &'static str;

    /// Applies the mutation. Must leave the model untouched on failure.
    fn execute(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore)
        -> CommandResult;

    /// Restores the pre-execute state captured by this command.
    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult;

    /// Called when a transient store identity was upgraded. Commands that
    /// cache store identities in snapshots rewrite them here; handle-based
    /// references need no action.
    fn on_identity_reassigned(&mut self, old_id: StoreId, new_id: StoreId) {
        let _ = (old_id, new_id);
    }

    /// Called after a refresh snapshot was applied. Returns `false` when
    /// the command can no longer resolve its references; the history
    /// evicts such commands from both stacks.
    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        let _ = model;
        true
    }
}

/// Editable field subset shared by task and project edit commands.
///
/// Creation metadata and worker assignments are deliberately absent: they
/// are owned by the store and the worker commands respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEdit {
    pub name: String,
    pub start_date: i64,
    pub end_date: Option<i64>,
    pub description: String,
    pub likely_duration: i32,
    pub min_duration: i32,
    pub max_duration: i32,
}

impl ItemEdit {
    /// Captures the editable subset of existing fields (the pre-image).
    pub fn from_fields(fields: &ItemFields) -> Self {
        Self {
            name: fields.name.clone(),
            start_date: fields.start_date,
            end_date: fields.end_date,
            description: fields.description.clone(),
            likely_duration: fields.likely_duration,
            min_duration: fields.min_duration,
            max_duration: fields.max_duration,
        }
    }

    /// Checks the same field rules `ItemFields::validate` enforces.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        let mut scratch = ItemFields::new(
            self.name.clone(),
            self.start_date,
            self.end_date,
            self.likely_duration,
        );
        scratch.min_duration = self.min_duration;
        scratch.max_duration = self.max_duration;
        scratch.validate()
    }

    /// Writes the edit onto existing fields, preserving non-editable ones.
    pub fn apply_to(&self, fields: &mut ItemFields) {
        fields.name = self.name.clone();
        fields.start_date = self.start_date;
        fields.end_date = self.end_date;
        fields.description = self.description.clone();
        fields.likely_duration = self.likely_duration;
        fields.min_duration = self.min_duration;
        fields.max_duration = self.max_duration;
    }
}

/// Builds the store record for a live task, resolving handles to store
/// identities. Links to still-transient tasks are omitted; the refresh
/// path heals them once the counterpart is persisted.
pub(crate) fn task_record(model: &ProjectModel, task: &Task) -> TaskRecord {
    let resolve = |handle: TaskHandle| -> Option<StoreId> {
        model
            .task(handle)
            .filter(|t| t.is_persisted())
            .map(|t| t.store_id)
    };
    TaskRecord {
        store_id: task.store_id,
        project_id: model.project().store_id,
        name: task.fields.name.clone(),
        start_date: task.fields.start_date,
        end_date: task.fields.end_date,
        description: task.fields.description.clone(),
        created_at: task.fields.created_at,
        creator: task.fields.creator.clone(),
        likely_duration: task.fields.likely_duration,
        min_duration: task.fields.min_duration,
        max_duration: task.fields.max_duration,
        order_index: task.order_index,
        parent_id: task.parent.and_then(resolve),
        dependencies: task.dependencies.iter().copied().filter_map(resolve).collect(),
        workers: task.fields.workers.iter().cloned().collect(),
    }
}

/// Builds the store record for the project.
pub(crate) fn project_record(project: &Project) -> ProjectRecord {
    ProjectRecord {
        store_id: project.store_id,
        name: project.fields.name.clone(),
        start_date: project.fields.start_date,
        end_date: project.fields.end_date,
        description: project.fields.description.clone(),
        created_at: project.fields.created_at,
        creator: project.fields.creator.clone(),
        likely_duration: project.fields.likely_duration,
        min_duration: project.fields.min_duration,
        max_duration: project.fields.max_duration,
    }
}

/// Full order/hierarchy snapshot used by move and delete undo paths.
#[derive(Debug, Clone)]
pub(crate) struct OrderSnapshot {
    rows: Vec<(TaskHandle, i64)>,
    parents: Vec<(TaskHandle, Option<TaskHandle>)>,
}

impl OrderSnapshot {
    pub(crate) fn capture(model: &ProjectModel) -> Self {
        let mut rows = Vec::with_capacity(model.task_count());
        let mut parents = Vec::with_capacity(model.task_count());
        for handle in model.sorted_tasks() {
            if let Some(task) = model.task(handle) {
                rows.push((handle, task.order_index));
                parents.push((handle, task.parent));
            }
        }
        Self { rows, parents }
    }

    /// Restores every captured row and parent link that still resolves.
    pub(crate) fn restore(&self, model: &mut ProjectModel, store: &mut dyn ProjectStore) {
        for (handle, parent) in &self.parents {
            crate::order::update_parent(model, store, *handle, *parent);
        }
        for (handle, row) in &self.rows {
            crate::order::set_row(model, store, *handle, *row);
        }
        debug_assert!(model.is_acyclic());
    }
}
