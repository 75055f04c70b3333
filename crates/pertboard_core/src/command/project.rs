//! Project-level commands.

use crate::command::{project_record, Command, CommandResult, ItemEdit};
use crate::model::event::ModelEvent;
use crate::model::item::is_persisted;
use crate::model::project::ProjectModel;
use crate::store::ProjectStore;

/// Rewrites the project's editable fields, keeping the pre-image for undo.
pub struct EditProjectCmd {
    edit: ItemEdit,
    previous: ItemEdit,
}

impl EditProjectCmd {
    /// Captures the current project fields as the undo pre-image.
    pub fn new(model: &ProjectModel, edit: ItemEdit) -> Self {
        Self {
            edit,
            previous: ItemEdit::from_fields(&model.project().fields),
        }
    }

    fn apply(
        &self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
        edit: &ItemEdit,
    ) -> CommandResult {
        edit.validate()?;
        if is_persisted(model.project().store_id) {
            let mut record = project_record(model.project());
            record.name = edit.name.clone();
            record.start_date = edit.start_date;
            record.end_date = edit.end_date;
            record.description = edit.description.clone();
            record.likely_duration = edit.likely_duration;
            record.min_duration = edit.min_duration;
            record.max_duration = edit.max_duration;
            store.update_project(&record)?;
        }
        edit.apply_to(&mut model.project_mut().fields);
        model.publish(ModelEvent::ProjectUpdated);
        Ok(())
    }
}

impl Command for EditProjectCmd {
    fn label(&self) -> &'static str {
        "edit_project"
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
}
