//! Worker assignment commands.

use crate::command::{Command, CommandResult, ValidationError};
use crate::model::event::ModelEvent;
use crate::model::item::StoreId;
use crate::model::project::ProjectModel;
use crate::model::task::TaskHandle;
use crate::store::ProjectStore;

fn persisted_id(model: &ProjectModel, task: TaskHandle) -> Option<StoreId> {
    model
        .task(task)
        .filter(|t| t.is_persisted())
        .map(|t| t.store_id)
}

fn add_worker(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    task: TaskHandle,
    worker: &str,
) -> CommandResult {
    if let Some(task_id) = persisted_id(model, task) {
        store.add_worker_link(task_id, worker)?;
    }
    if let Some(record) = model.task_mut(task) {
        record.fields.workers.insert(worker.to_string());
    }
    model.publish(ModelEvent::TaskUpdated(task));
    Ok(())
}

fn remove_worker(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    task: TaskHandle,
    worker: &str,
) -> CommandResult {
    if let Some(task_id) = persisted_id(model, task) {
        store.remove_worker_link(task_id, worker)?;
    }
    if let Some(record) = model.task_mut(task) {
        record.fields.workers.remove(worker);
    }
    model.publish(ModelEvent::TaskUpdated(task));
    Ok(())
}

/// Assigns a worker to a task.
pub struct AssignWorkerCmd {
    task: TaskHandle,
    worker: String,
}

impl AssignWorkerCmd {
    pub fn new(task: TaskHandle, worker: impl Into<String>) -> Self {
        Self {
            task,
            worker: worker.into(),
        }
    }
}

impl Command for AssignWorkerCmd {
    fn label(&self) -> &'static str {
        "assign_worker"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        let record = model
            .task(self.task)
            .ok_or(ValidationError::MissingTask(self.task))?;
        if record.fields.workers.contains(&self.worker) {
            return Err(ValidationError::WorkerAlreadyAssigned(self.worker.clone()).into());
        }
        add_worker(model, store, self.task, &self.worker)
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        remove_worker(model, store, self.task, &self.worker)
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        model.contains(self.task)
    }
}

/// Removes a worker assignment from a task.
pub struct UnassignWorkerCmd {
    task: TaskHandle,
    worker: String,
}

impl UnassignWorkerCmd {
    pub fn new(task: TaskHandle, worker: impl Into<String>) -> Self {
        Self {
            task,
            worker: worker.into(),
        }
    }
}

impl Command for UnassignWorkerCmd {
    fn label(&self) -> &'static str {
        "unassign_worker"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        let record = model
            .task(self.task)
            .ok_or(ValidationError::MissingTask(self.task))?;
        if !record.fields.workers.contains(&self.worker) {
            return Err(ValidationError::WorkerNotAssigned(self.worker.clone()).into());
        }
        remove_worker(model, store, self.task, &self.worker)
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        add_worker(model, store, self.task, &self.worker)
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        model.contains(self.task)
    }
}
