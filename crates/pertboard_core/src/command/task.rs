//! Task lifecycle commands: create, edit, delete, move.
//!
//! # Responsibility
//! - Implement reversible task mutations with store-first writes.
//!
//! # Invariants
//! - Create/delete pairs reuse the original arena handle on undo/redo,
//!   so later commands referencing the task keep resolving.
//! - Delete snapshots enough state (record, inbound blockers, full order
//!   and hierarchy) to rebuild the exact pre-delete model.

use crate::command::{
    task_record, Command, CommandError, CommandResult, ItemEdit, OrderSnapshot, ValidationError,
};
use crate::model::event::ModelEvent;
use crate::model::item::{is_persisted, ItemFields, StoreId};
use crate::model::project::ProjectModel;
use crate::model::task::{Task, TaskHandle};
use crate::order;
use crate::store::ProjectStore;
use log::debug;

/// Creates a task at the end of the flattened sequence, optionally
/// attached under a parent.
pub struct CreateTaskCmd {
    fields: ItemFields,
    parent: Option<TaskHandle>,
    created: Option<TaskHandle>,
    executed: bool,
}

impl CreateTaskCmd {
    pub fn new(fields: ItemFields, parent: Option<TaskHandle>) -> Self {
        Self {
            fields,
            parent,
            created: None,
            executed: false,
        }
    }

    /// Handle of the created task, available after the first `execute`.
    pub fn created_handle(&self) -> Option<TaskHandle> {
        self.created
    }
}

impl Command for CreateTaskCmd {
    fn label(&self) -> &'static str {
        "create_task"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        self.fields.validate()?;
        if model.name_in_use(&self.fields.name, None) {
            return Err(ValidationError::DuplicateTaskName(self.fields.name.clone()).into());
        }
        if let Some(parent) = self.parent {
            if !model.contains(parent) {
                return Err(ValidationError::MissingParent(parent).into());
            }
        }

        // Stamped once so the local record matches what polls report back.
        if self.fields.created_at == 0 {
            self.fields.created_at = crate::model::item::now_ms();
        }

        // Redo reuses the handle assigned on the first run.
        let handle = match self.created {
            Some(handle) => {
                let order_index = model.max_order_index() + 1;
                model.insert_task_record(Task::new(handle, self.fields.clone(), order_index));
                handle
            }
            None => model.insert_task(self.fields.clone()),
        };
        self.created = Some(handle);

        let record = match model.task(handle) {
            Some(task) => task_record(model, task),
            None => return Err(ValidationError::MissingTask(handle).into()),
        };
        match store.create_task(&record) {
            Ok(store_id) => {
                model.set_store_id(handle, store_id);
                debug!("event=create_task module=command status=ok task={store_id}");
            }
            Err(err) => {
                // The insert landed at the end, so removal leaves the
                // order sequence dense without renumbering.
                model.remove_task(handle);
                return Err(err.into());
            }
        }

        if let Some(parent) = self.parent {
            order::attach_as_subtask(model, store, handle, parent);
        }
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        let handle = match self.created {
            Some(handle) => handle,
            None => return Ok(()),
        };
        let task = match model.task(handle) {
            Some(task) => task,
            None => return Err(ValidationError::MissingTask(handle).into()),
        };
        let store_id = task.store_id;
        let children = task.children.clone();

        if is_persisted(store_id) {
            store.delete_task(store_id)?;
        }
        for child in children {
            model.set_parent(child, None);
        }
        model.sever_dependencies_to(handle);
        model.set_parent(handle, None);
        order::remove_and_compact(model, store, handle);
        self.executed = false;
        Ok(())
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        match self.created {
            Some(handle) if self.executed => model.contains(handle),
            _ => true,
        }
    }
}

/// Rewrites a task's editable fields, keeping the pre-image for undo.
///
/// The pre-image is captured at construction, matching how an edit dialog
/// snapshots the record when it opens.
pub struct EditTaskCmd {
    task: TaskHandle,
    edit: ItemEdit,
    previous: ItemEdit,
}

impl EditTaskCmd {
    pub fn new(model: &ProjectModel, task: TaskHandle, edit: ItemEdit) -> Result<Self, CommandError> {
        let current = model
            .task(task)
            .ok_or(ValidationError::MissingTask(task))?;
        Ok(Self {
            task,
            edit,
            previous: ItemEdit::from_fields(&current.fields),
        })
    }

    fn apply(
        &self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
        edit: &ItemEdit,
    ) -> CommandResult {
        edit.validate()?;
        if model.name_in_use(&edit.name, Some(self.task)) {
            return Err(ValidationError::DuplicateTaskName(edit.name.clone()).into());
        }
        let (persisted, mut fields) = match model.task(self.task) {
            Some(task) => (task.is_persisted(), task.fields.clone()),
            None => return Err(ValidationError::MissingTask(self.task).into()),
        };
        edit.apply_to(&mut fields);

        if persisted {
            let mut record = match model.task(self.task) {
                Some(task) => task_record(model, task),
                None => return Err(ValidationError::MissingTask(self.task).into()),
            };
            record.name = fields.name.clone();
            record.start_date = fields.start_date;
            record.end_date = fields.end_date;
            record.description = fields.description.clone();
            record.likely_duration = fields.likely_duration;
            record.min_duration = fields.min_duration;
            record.max_duration = fields.max_duration;
            store.update_task(&record)?;
        }
        if let Some(task) = model.task_mut(self.task) {
            task.fields = fields;
        }
        model.publish(ModelEvent::TaskUpdated(self.task));
        Ok(())
    }
}

impl Command for EditTaskCmd {
    fn label(&self) -> &'static str {
        "edit_task"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        let edit = self.edit.clone();
        self.apply(model, store, &edit)
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        let previous = self.previous.clone();
        self.apply(model, store, &previous)
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        model.contains(self.task)
    }
}

/// Everything needed to rebuild a deleted task and its surroundings.
struct DeleteSnapshot {
    record: Task,
    was_persisted: bool,
    blockers: Vec<TaskHandle>,
    order: OrderSnapshot,
}

/// Deletes a task, orphaning its children to root level.
pub struct DeleteTaskCmd {
    task: TaskHandle,
    snapshot: Option<DeleteSnapshot>,
    executed: bool,
}

impl DeleteTaskCmd {
    pub fn new(task: TaskHandle) -> Self {
        Self {
            task,
            snapshot: None,
            executed: false,
        }
    }
}

impl Command for DeleteTaskCmd {
    fn label(&self) -> &'static str {
        "delete_task"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        let record = match model.task(self.task) {
            Some(task) => task.clone(),
            None => return Err(ValidationError::MissingTask(self.task).into()),
        };
        let was_persisted = record.is_persisted();

        // Store first. The schema cascades link rows and nulls child
        // parent links, so memory-side detachment below needs no further
        // store writes.
        if was_persisted {
            store.delete_task(record.store_id)?;
        }

        let order = OrderSnapshot::capture(model);
        for child in record.children.clone() {
            model.set_parent(child, None);
        }
        let blockers = model.sever_dependencies_to(self.task);
        model.set_parent(self.task, None);
        order::remove_and_compact(model, store, self.task);

        debug!(
            "event=delete_task module=command status=ok task={}",
            record.store_id
        );
        self.snapshot = Some(DeleteSnapshot {
            record,
            was_persisted,
            blockers,
            order,
        });
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        let snapshot = match &self.snapshot {
            Some(snapshot) => snapshot,
            None => return Ok(()),
        };
        let mut record = snapshot.record.clone();
        let children = std::mem::take(&mut record.children);
        let parent = record.parent.take();

        // The store assigns a fresh identity on re-insert; live commands
        // are told about the swap through the reconcile path.
        if snapshot.was_persisted {
            record.store_id = crate::model::item::TRANSIENT_ID;
            model.insert_task_record(record);
            let fresh = match model.task(self.task) {
                Some(task) => task_record(model, task),
                None => return Err(ValidationError::MissingTask(self.task).into()),
            };
            match store.create_task(&fresh) {
                Ok(store_id) => model.set_store_id(self.task, store_id),
                Err(err) => {
                    model.remove_task(self.task);
                    return Err(err.into());
                }
            }
        } else {
            model.insert_task_record(record);
        }

        for child in children {
            order::update_parent(model, store, child, Some(self.task));
        }
        order::update_parent(model, store, self.task, parent);
        // Outbound edges travel inside the record and are persisted by
        // `create_task`; only inbound edges need explicit restoration.
        for blocker in &snapshot.blockers {
            if model.add_dependency(*blocker, self.task) {
                persist_dependency(model, store, *blocker, self.task)?;
            }
        }
        snapshot.order.restore(model, store);
        self.executed = false;
        Ok(())
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        // While undone the task must still resolve; while executed the
        // command only holds its snapshot and stays valid.
        if self.executed {
            true
        } else {
            model.contains(self.task)
        }
    }
}

/// Moves a task group directly above a target row (or to the end).
pub struct MoveTaskCmd {
    task: TaskHandle,
    target: Option<TaskHandle>,
    previous: Option<OrderSnapshot>,
}

impl MoveTaskCmd {
    /// `target == None` moves the group to the end of the sequence.
    pub fn new(task: TaskHandle, target: Option<TaskHandle>) -> Self {
        Self {
            task,
            target,
            previous: None,
        }
    }
}

impl Command for MoveTaskCmd {
    fn label(&self) -> &'static str {
        "move_task"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        if !model.contains(self.task) {
            return Err(ValidationError::MissingTask(self.task).into());
        }
        if let Some(target) = self.target {
            if !model.contains(target) {
                return Err(ValidationError::MissingTask(target).into());
            }
        }
        let before = OrderSnapshot::capture(model);
        if !order::move_group_to(model, store, self.task, self.target) {
            return Err(CommandError::OrderingConstraint);
        }
        self.previous = Some(before);
        Ok(())
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        if let Some(previous) = &self.previous {
            previous.restore(model, store);
        }
        Ok(())
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        model.contains(self.task) && self.target.map_or(true, |target| model.contains(target))
    }
}

/// Writes one dependency link to the store when both ends are persisted.
fn persist_dependency(
    model: &ProjectModel,
    store: &mut dyn ProjectStore,
    blocker: TaskHandle,
    dependent: TaskHandle,
) -> CommandResult {
    let blocker_id = persisted_id(model, blocker);
    let dependent_id = persisted_id(model, dependent);
    if let (Some(blocker_id), Some(dependent_id)) = (blocker_id, dependent_id) {
        store.add_dependency_link(blocker_id, dependent_id)?;
    }
    Ok(())
}

fn persisted_id(model: &ProjectModel, handle: TaskHandle) -> Option<StoreId> {
    model
        .task(handle)
        .filter(|task| task.is_persisted())
        .map(|task| task.store_id)
}
