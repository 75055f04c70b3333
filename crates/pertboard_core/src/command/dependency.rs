//! Dependency edge commands.
//!
//! Edges are stored on the blocker side: `blocker -> dependent` means the
//! dependent cannot start until the blocker finishes.

use crate::command::{Command, CommandResult, ValidationError};
use crate::model::project::ProjectModel;
use crate::model::task::TaskHandle;
use crate::store::ProjectStore;

fn check_tasks(
    model: &ProjectModel,
    blocker: TaskHandle,
    dependent: TaskHandle,
) -> Result<(), ValidationError> {
    if blocker == dependent {
        return Err(ValidationError::SelfDependency(blocker));
    }
    if !model.contains(blocker) {
        return Err(ValidationError::MissingTask(blocker));
    }
    if !model.contains(dependent) {
        return Err(ValidationError::MissingTask(dependent));
    }
    Ok(())
}

fn edge_exists(model: &ProjectModel, blocker: TaskHandle, dependent: TaskHandle) -> bool {
    model
        .task(blocker)
        .map_or(false, |task| task.dependencies.contains(&dependent))
}

/// Store ids for both ends when the edge can be persisted.
fn persisted_edge(
    model: &ProjectModel,
    blocker: TaskHandle,
    dependent: TaskHandle,
) -> Option<(i64, i64)> {
    let blocker = model.task(blocker).filter(|t| t.is_persisted())?;
    let dependent = model.task(dependent).filter(|t| t.is_persisted())?;
    Some((blocker.store_id, dependent.store_id))
}

/// Adds a dependency edge between two tasks.
pub struct AddDependencyCmd {
    blocker: TaskHandle,
    dependent: TaskHandle,
}

impl AddDependencyCmd {
    pub fn new(blocker: TaskHandle, dependent: TaskHandle) -> Self {
        Self { blocker, dependent }
    }
}

impl Command for AddDependencyCmd {
    fn label(&self) -> &'static str {
        "add_dependency"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        check_tasks(model, self.blocker, self.dependent)?;
        if edge_exists(model, self.blocker, self.dependent) {
            return Err(ValidationError::DependencyExists {
                blocker: self.blocker,
                dependent: self.dependent,
            }
            .into());
        }
        if let Some((blocker_id, dependent_id)) = persisted_edge(model, self.blocker, self.dependent)
        {
            store.add_dependency_link(blocker_id, dependent_id)?;
        }
        model.add_dependency(self.blocker, self.dependent);
        Ok(())
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        if let Some((blocker_id, dependent_id)) = persisted_edge(model, self.blocker, self.dependent)
        {
            store.remove_dependency_link(blocker_id, dependent_id)?;
        }
        model.remove_dependency(self.blocker, self.dependent);
        Ok(())
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        model.contains(self.blocker) && model.contains(self.dependent)
    }
}

/// Removes a dependency edge between two tasks.
pub struct RemoveDependencyCmd {
    blocker: TaskHandle,
    dependent: TaskHandle,
}

impl RemoveDependencyCmd {
    pub fn new(blocker: TaskHandle, dependent: TaskHandle) -> Self {
        Self { blocker, dependent }
    }
}

impl Command for RemoveDependencyCmd {
    fn label(&self) -> &'static str {
        "remove_dependency"
    }

    fn execute(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        check_tasks(model, self.blocker, self.dependent)?;
        if !edge_exists(model, self.blocker, self.dependent) {
            return Err(ValidationError::DependencyMissing {
                blocker: self.blocker,
                dependent: self.dependent,
            }
            .into());
        }
        if let Some((blocker_id, dependent_id)) = persisted_edge(model, self.blocker, self.dependent)
        {
            store.remove_dependency_link(blocker_id, dependent_id)?;
        }
        model.remove_dependency(self.blocker, self.dependent);
        Ok(())
    }

    fn undo(&mut self, model: &mut ProjectModel, store: &mut dyn ProjectStore) -> CommandResult {
        if let Some((blocker_id, dependent_id)) = persisted_edge(model, self.blocker, self.dependent)
        {
            store.add_dependency_link(blocker_id, dependent_id)?;
        }
        model.add_dependency(self.blocker, self.dependent);
        Ok(())
    }

    fn on_model_refresh(&mut self, model: &ProjectModel) -> bool {
        model.contains(self.blocker) && model.contains(self.dependent)
    }
}
