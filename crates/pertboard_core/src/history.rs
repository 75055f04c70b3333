//! Undo/redo stacks over executed commands.
//!
//! # Responsibility
//! - Run commands and keep the undo/redo stacks consistent.
//! - Relay identity and refresh notifications to live commands.
//!
//! # Invariants
//! - Only successfully executed commands enter the undo stack.
//! - Any new command clears the redo stack.
//! - A failed undo/redo pushes the command back where it came from, so
//!   the user can retry once the store recovers.

use crate::command::{Command, CommandError, CommandResult};
use crate::model::item::StoreId;
use crate::model::project::ProjectModel;
use crate::store::ProjectStore;
use log::{debug, info, warn};

/// Ordered history of executed commands.
#[derive(Default)]
pub struct CommandHistory {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes a command; success pushes it onto the undo stack and
    /// clears the redo stack. Failure leaves history untouched.
    pub fn run(
        &mut self,
        mut command: Box<dyn Command>,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> CommandResult {
        let label = command.label();
        match command.execute(model, store) {
            Ok(()) => {
                debug!("event=run module=history status=ok command={label}");
                self.redo_stack.clear();
                self.undo_stack.push(command);
                Ok(())
            }
            Err(err) => {
                warn!("event=run module=history status=error command={label} error={err}");
                Err(err)
            }
        }
    }

    /// Undoes the most recent command. `Ok(false)` means nothing to undo.
    pub fn undo_last(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> Result<bool, CommandError> {
        let mut command = match self.undo_stack.pop() {
            Some(command) => command,
            None => return Ok(false),
        };
        let label = command.label();
        match command.undo(model, store) {
            Ok(()) => {
                debug!("event=undo module=history status=ok command={label}");
                self.redo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                warn!("event=undo module=history status=error command={label} error={err}");
                self.undo_stack.push(command);
                Err(err)
            }
        }
    }

    /// Redoes the most recently undone command. `Ok(false)` means nothing
    /// to redo.
    pub fn redo_last(
        &mut self,
        model: &mut ProjectModel,
        store: &mut dyn ProjectStore,
    ) -> Result<bool, CommandError> {
        let mut command = match self.redo_stack.pop() {
            Some(command) => command,
            None => return Ok(false),
        };
        let label = command.label();
        match command.execute(model, store) {
            Ok(()) => {
                debug!("event=redo module=history status=ok command={label}");
                self.undo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                warn!("event=redo module=history status=error command={label} error={err}");
                self.redo_stack.push(command);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drops both stacks, e.g. when a different project is opened.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Tells every live command that a transient identity was upgraded.
    pub fn notify_identity_reassigned(&mut self, old_id: StoreId, new_id: StoreId) {
        for command in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            command.on_identity_reassigned(old_id, new_id);
        }
    }

    /// Tells every live command that a refresh snapshot was applied and
    /// evicts the ones that can no longer resolve their references.
    pub fn notify_model_refresh(&mut self, model: &ProjectModel) -> usize {
        let before = self.undo_stack.len() + self.redo_stack.len();
        self.undo_stack
            .retain_mut(|command| command.on_model_refresh(model));
        self.redo_stack
            .retain_mut(|command| command.on_model_refresh(model));
        let evicted = before - self.undo_stack.len() - self.redo_stack.len();
        if evicted > 0 {
            info!("event=refresh module=history status=ok evicted={evicted}");
        }
        evicted
    }
}
