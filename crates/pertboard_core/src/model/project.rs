//! Project record and the in-memory task arena.
//!
//! # Responsibility
//! - Own the single edited project and the table of live task records.
//! - Hand out stable handles and publish typed change events.
//!
//! # Invariants
//! - Handles are never reused within a session; reinsertion after undo
//!   keeps the original handle so live commands stay valid.
//! - Every in-memory mutation of a task publishes `TaskUpdated` (or
//!   `TaskDeleted`), so UI observers track the optimistic state.
//! - Parent/child links are kept symmetric by `set_parent`.

use crate::model::event::{EventBus, ModelEvent, ModelSubscriber, SubscriptionId};
use crate::model::item::{ItemFields, StoreId, TRANSIENT_ID};
use crate::model::task::{Task, TaskHandle};
use std::collections::BTreeMap;
use std::rc::Rc;

/// The container of record for all tasks in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Store identity, `TRANSIENT_ID` until persisted.
    pub store_id: StoreId,
    /// Shared timed-item fields.
    pub fields: ItemFields,
    /// Set when a refresh snapshot changed this record.
    pub dirty: bool,
}

impl Project {
    pub fn new(fields: ItemFields) -> Self {
        Self {
            store_id: TRANSIENT_ID,
            fields,
            dirty: false,
        }
    }
}

/// In-memory entity graph for one edited project.
///
/// Tasks live in an arena keyed by [`TaskHandle`]; the flattened display
/// sequence is derived from each task's dense `order_index`.
pub struct ProjectModel {
    project: Project,
    tasks: BTreeMap<TaskHandle, Task>,
    next_handle: TaskHandle,
    bus: EventBus,
}

impl ProjectModel {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            tasks: BTreeMap::new(),
            next_handle: 1,
            bus: EventBus::new(),
        }
    }

    // ---- project record ----

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub(crate) fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    pub(crate) fn publish(&mut self, event: ModelEvent) {
        self.bus.publish(event);
    }

    /// Registers a UI-side observer for model change events.
    pub fn subscribe(&mut self, subscriber: &Rc<dyn ModelSubscriber>) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    // ---- task lookup ----

    pub fn task(&self, handle: TaskHandle) -> Option<&Task> {
        self.tasks.get(&handle)
    }

    pub(crate) fn task_mut(&mut self, handle: TaskHandle) -> Option<&mut Task> {
        self.tasks.get_mut(&handle)
    }

    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// All task handles sorted by order index (the flattened sequence).
    pub fn sorted_tasks(&self) -> Vec<TaskHandle> {
        let mut handles: Vec<TaskHandle> = self.tasks.keys().copied().collect();
        handles.sort_by_key(|handle| (self.tasks[handle].order_index, *handle));
        handles
    }

    /// Root-level tasks in flattened order.
    pub fn root_tasks(&self) -> Vec<TaskHandle> {
        self.sorted_tasks()
            .into_iter()
            .filter(|handle| self.tasks[handle].parent.is_none())
            .collect()
    }

    /// Largest order index in use, or -1 when the project is empty.
    pub fn max_order_index(&self) -> i64 {
        self.tasks
            .values()
            .map(|task| task.order_index)
            .max()
            .unwrap_or(-1)
    }

    /// Resolves a persisted store identity back to its live handle.
    pub fn find_by_store_id(&self, store_id: StoreId) -> Option<TaskHandle> {
        self.tasks
            .values()
            .find(|task| task.store_id == store_id)
            .map(|task| task.handle)
    }

    /// Returns whether `name` is taken by a task other than `exclude`.
    pub fn name_in_use(&self, name: &str, exclude: Option<TaskHandle>) -> bool {
        self.tasks
            .values()
            .any(|task| Some(task.handle) != exclude && task.fields.name == name)
    }

    // ---- task insertion/removal ----

    /// Inserts a new transient task at the end of the flattened sequence.
    pub(crate) fn insert_task(&mut self, fields: ItemFields) -> TaskHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        let order_index = self.max_order_index() + 1;
        self.tasks.insert(handle, Task::new(handle, fields, order_index));
        self.publish(ModelEvent::TaskUpdated(handle));
        handle
    }

    /// Reinserts a previously removed record under its original handle.
    ///
    /// Used by undo of delete and redo of create so later commands keep
    /// resolving the same handle.
    pub(crate) fn insert_task_record(&mut self, task: Task) {
        let handle = task.handle;
        debug_assert!(!self.tasks.contains_key(&handle));
        if handle >= self.next_handle {
            self.next_handle = handle + 1;
        }
        self.tasks.insert(handle, task);
        self.publish(ModelEvent::TaskUpdated(handle));
    }

    /// Removes a task record and notifies observers.
    ///
    /// Callers are responsible for detaching relations and re-densifying
    /// order indices first (see the ordering engine).
    pub(crate) fn remove_task(&mut self, handle: TaskHandle) -> Option<Task> {
        let removed = self.tasks.remove(&handle);
        if removed.is_some() {
            self.publish(ModelEvent::TaskDeleted(handle));
        }
        removed
    }

    // ---- identity ----

    pub(crate) fn set_store_id(&mut self, handle: TaskHandle, store_id: StoreId) {
        if let Some(task) = self.tasks.get_mut(&handle) {
            task.store_id = store_id;
            self.publish(ModelEvent::TaskUpdated(handle));
        }
    }

    // ---- ordering and hierarchy ----

    pub(crate) fn set_order_index(&mut self, handle: TaskHandle, order_index: i64) {
        if let Some(task) = self.tasks.get_mut(&handle) {
            if task.order_index != order_index {
                task.order_index = order_index;
                self.publish(ModelEvent::TaskUpdated(handle));
            }
        }
    }

    /// Re-points a task's structural parent, keeping child lists symmetric.
    ///
    /// Returns `true` when anything changed. Does not touch order indices.
    pub(crate) fn set_parent(&mut self, child: TaskHandle, parent: Option<TaskHandle>) -> bool {
        let old_parent = match self.tasks.get(&child) {
            Some(task) if task.parent != parent => task.parent,
            _ => return false,
        };
        if let Some(old) = old_parent {
            if let Some(record) = self.tasks.get_mut(&old) {
                record.children.retain(|h| *h != child);
            }
        }
        if let Some(new) = parent {
            if let Some(record) = self.tasks.get_mut(&new) {
                record.children.push(child);
            }
        }
        if let Some(record) = self.tasks.get_mut(&child) {
            record.parent = parent;
        }
        self.publish(ModelEvent::TaskUpdated(child));
        if let Some(old) = old_parent {
            self.publish(ModelEvent::TaskUpdated(old));
        }
        if let Some(new) = parent {
            self.publish(ModelEvent::TaskUpdated(new));
        }
        true
    }

    /// Returns whether `task` sits below `ancestor` in the hierarchy.
    ///
    /// Guarded against accidental parent cycles: the walk stops after
    /// visiting every task once.
    pub fn is_descendant_of(&self, task: TaskHandle, ancestor: TaskHandle) -> bool {
        let mut cursor = self.tasks.get(&task).and_then(|t| t.parent);
        let mut steps = 0usize;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.tasks.len() {
                debug_assert!(false, "parent cycle detected at task {current}");
                return false;
            }
            cursor = self.tasks.get(&current).and_then(|t| t.parent);
        }
        false
    }

    /// Verifies the parent graph is a forest. Used from debug assertions
    /// after every structural mutation.
    pub fn is_acyclic(&self) -> bool {
        for start in self.tasks.keys() {
            let mut cursor = self.tasks[start].parent;
            let mut steps = 0usize;
            while let Some(current) = cursor {
                steps += 1;
                if steps > self.tasks.len() {
                    return false;
                }
                cursor = self.tasks.get(&current).and_then(|t| t.parent);
            }
        }
        true
    }

    // ---- dependencies ----

    /// Records that `dependent` cannot start until `blocker` finishes.
    pub(crate) fn add_dependency(&mut self, blocker: TaskHandle, dependent: TaskHandle) -> bool {
        let inserted = match self.tasks.get_mut(&blocker) {
            Some(task) => task.dependencies.insert(dependent),
            None => false,
        };
        if inserted {
            self.publish(ModelEvent::TaskUpdated(blocker));
        }
        inserted
    }

    pub(crate) fn remove_dependency(&mut self, blocker: TaskHandle, dependent: TaskHandle) -> bool {
        let removed = match self.tasks.get_mut(&blocker) {
            Some(task) => task.dependencies.remove(&dependent),
            None => false,
        };
        if removed {
            self.publish(ModelEvent::TaskUpdated(blocker));
        }
        removed
    }

    /// Severs every dependency edge pointing at `target` and returns the
    /// blockers that held one. Dependency removal is symmetric: deleting a
    /// task must not leave residual references on either side.
    pub(crate) fn sever_dependencies_to(&mut self, target: TaskHandle) -> Vec<TaskHandle> {
        let blockers: Vec<TaskHandle> = self
            .tasks
            .values()
            .filter(|task| task.dependencies.contains(&target))
            .map(|task| task.handle)
            .collect();
        for blocker in &blockers {
            if let Some(task) = self.tasks.get_mut(blocker) {
                task.dependencies.remove(&target);
            }
            self.publish(ModelEvent::TaskUpdated(*blocker));
        }
        blockers
    }
}

#[cfg(test)]
mod tests {
    use super::{Project, ProjectModel};
    use crate::model::item::ItemFields;

    fn model() -> ProjectModel {
        ProjectModel::new(Project::new(ItemFields::new("Demo", 0, None, 1)))
    }

    #[test]
    fn insert_assigns_dense_order_and_fresh_handles() {
        let mut model = model();
        let a = model.insert_task(ItemFields::new("A", 0, None, 1));
        let b = model.insert_task(ItemFields::new("B", 0, None, 1));
        assert_ne!(a, b);
        assert_eq!(model.task(a).unwrap().order_index, 0);
        assert_eq!(model.task(b).unwrap().order_index, 1);
        assert_eq!(model.sorted_tasks(), vec![a, b]);
    }

    #[test]
    fn reinsert_keeps_handle_and_never_reissues_it() {
        let mut model = model();
        let a = model.insert_task(ItemFields::new("A", 0, None, 1));
        let record = model.remove_task(a).unwrap();
        model.insert_task_record(record);
        let b = model.insert_task(ItemFields::new("B", 0, None, 1));
        assert!(model.contains(a));
        assert_ne!(a, b);
    }

    #[test]
    fn set_parent_keeps_child_lists_symmetric() {
        let mut model = model();
        let parent = model.insert_task(ItemFields::new("P", 0, None, 1));
        let other = model.insert_task(ItemFields::new("Q", 0, None, 1));
        let child = model.insert_task(ItemFields::new("C", 0, None, 1));

        assert!(model.set_parent(child, Some(parent)));
        assert_eq!(model.task(parent).unwrap().children, vec![child]);

        assert!(model.set_parent(child, Some(other)));
        assert!(model.task(parent).unwrap().children.is_empty());
        assert_eq!(model.task(other).unwrap().children, vec![child]);
        assert_eq!(model.task(child).unwrap().parent, Some(other));

        assert!(!model.set_parent(child, Some(other)), "no-op returns false");
    }

    #[test]
    fn descendant_walk_crosses_levels() {
        let mut model = model();
        let a = model.insert_task(ItemFields::new("A", 0, None, 1));
        let b = model.insert_task(ItemFields::new("B", 0, None, 1));
        let c = model.insert_task(ItemFields::new("C", 0, None, 1));
        model.set_parent(b, Some(a));
        model.set_parent(c, Some(b));

        assert!(model.is_descendant_of(c, a));
        assert!(model.is_descendant_of(b, a));
        assert!(!model.is_descendant_of(a, c));
        assert!(model.is_acyclic());
    }

    #[test]
    fn sever_dependencies_removes_all_inbound_edges() {
        let mut model = model();
        let a = model.insert_task(ItemFields::new("A", 0, None, 1));
        let b = model.insert_task(ItemFields::new("B", 0, None, 1));
        let c = model.insert_task(ItemFields::new("C", 0, None, 1));
        model.add_dependency(a, c);
        model.add_dependency(b, c);

        let blockers = model.sever_dependencies_to(c);
        assert_eq!(blockers, vec![a, b]);
        assert!(model.task(a).unwrap().dependencies.is_empty());
        assert!(model.task(b).unwrap().dependencies.is_empty());
    }

    #[test]
    fn name_lookup_honors_exclusion() {
        let mut model = model();
        let a = model.insert_task(ItemFields::new("A", 0, None, 1));
        assert!(model.name_in_use("A", None));
        assert!(!model.name_in_use("A", Some(a)));
        assert!(!model.name_in_use("B", None));
    }
}
