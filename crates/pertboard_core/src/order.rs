//! Ordering engine for the flattened task sequence.
//!
//! # Responsibility
//! - Keep every task group (a task plus all transitive descendants) on a
//!   contiguous run of order indices.
//! - Implement group moves, relative shifts, subtask adoption, and dense
//!   renumbering after removal.
//!
//! # Invariants
//! - Order indices are dense over `[0, task_count)` at every stable point;
//!   duplication is permitted only inside a move, never observable outside.
//! - A task can never be moved into the range of its own group.
//! - Every order-index or parent mutation is persisted and published;
//!   incremental persistence failures are logged, not raised, because the
//!   next poll reconciles the stored order ("last poll wins").

use crate::model::project::ProjectModel;
use crate::model::task::TaskHandle;
use crate::store::ProjectStore;
use log::{debug, warn};

/// Returns the first task after `task`'s group in the flattened sequence,
/// or `None` when the group runs to the end.
pub fn task_after_group(model: &ProjectModel, task: TaskHandle) -> Option<TaskHandle> {
    let tasks = model.sorted_tasks();
    let start = tasks.iter().position(|h| *h == task)?;
    tasks
        .iter()
        .skip(start + 1)
        .find(|h| !model.is_descendant_of(**h, task))
        .copied()
}

/// Moves `task` and its whole group to sit directly above `target`, or to
/// the end of the sequence when `target` is `None`.
///
/// Returns `false` without mutating anything when the destination lies
/// inside the group's own range (the move would nest a task under one of
/// its descendants). Unknown handles also return `false`.
///
/// After the shift the moved task is re-parented from its new neighborhood:
/// the task directly above adopts it when that task already has children;
/// otherwise the moved task becomes a sibling under that task's parent; a
/// move to the top makes it a root.
pub fn move_group_to(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    task: TaskHandle,
    target: Option<TaskHandle>,
) -> bool {
    if !model.contains(task) {
        return false;
    }
    if let Some(t) = target {
        if t == task {
            return true;
        }
        if !model.contains(t) {
            return false;
        }
    }

    let tasks = model.sorted_tasks();
    let len = tasks.len();
    let start_group = match tasks.iter().position(|h| *h == task) {
        Some(index) => index,
        None => return false,
    };
    let mut end_group = start_group + 1;
    while end_group < len && model.is_descendant_of(tasks[end_group], task) {
        end_group += 1;
    }

    let max_row = model.max_order_index();
    let own_row = row_of(model, task);
    let end_row = if end_group < len {
        row_of(model, tasks[end_group])
    } else {
        max_row + 1
    };
    let dest_row = match target {
        Some(t) => row_of(model, t),
        None => max_row + 1,
    };

    if target.is_some() && dest_row >= own_row && dest_row < end_row {
        debug!(
            "event=move_group module=order status=rejected task={task} dest_row={dest_row} group_rows={own_row}..{end_row}"
        );
        return false;
    }
    if target.is_none() && end_group == len {
        // Already at the end.
        return true;
    }

    // Rows the group currently occupies become the free slots to hand out.
    let mut available: Vec<i64> = (own_row..end_row).collect();

    // Phase one: evacuate the group past the current maximum so the shift
    // below never produces an observable duplicate index.
    let mut evac_row = max_row;
    for handle in &tasks[start_group..end_group] {
        evac_row += 1;
        set_row(model, store, *handle, evac_row);
    }

    // Phase two: shift the intervening tasks toward the vacated span, then
    // drop the group into the freed contiguous block.
    if dest_row > own_row {
        let mut slot = 0usize;
        let mut i = end_group;
        while i < len && row_of(model, tasks[i]) < dest_row {
            available.push(row_of(model, tasks[i]));
            set_row(model, store, tasks[i], available[slot]);
            slot += 1;
            i += 1;
        }
        for handle in &tasks[start_group..end_group] {
            set_row(model, store, *handle, available[slot]);
            slot += 1;
        }
    } else {
        let mut slot = available.len();
        let mut i = start_group;
        while i > 0 && row_of(model, tasks[i - 1]) >= dest_row {
            i -= 1;
            available.insert(0, row_of(model, tasks[i]));
            // The front insert keeps `slot` pointing one past the handed-out
            // range, so no decrement here.
            set_row(model, store, tasks[i], available[slot]);
        }
        for handle in tasks[start_group..end_group].iter().rev() {
            slot -= 1;
            set_row(model, store, *handle, available[slot]);
        }
    }

    reparent_after_move(model, store, task);
    debug_assert!(model.is_acyclic());
    debug!("event=move_group module=order status=ok task={task} dest_row={dest_row}");
    true
}

/// Moves `task` by `delta` rows (negative shifts up), clamped to the
/// sequence ends. Returns `false` when the move is rejected.
pub fn shift_rows(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    task: TaskHandle,
    delta: i64,
) -> bool {
    let tasks = model.sorted_tasks();
    let index = match tasks.iter().position(|h| *h == task) {
        Some(index) => index,
        None => return false,
    };
    let dest = index as i64 + delta;
    if dest >= tasks.len() as i64 {
        move_group_to(model, store, task, None)
    } else {
        let clamped = dest.max(0) as usize;
        move_group_to(model, store, task, Some(tasks[clamped]))
    }
}

/// Shifts `child`'s group to the end of `parent`'s group and adopts it.
///
/// Returns `false` when the adoption is impossible (unknown handles, or
/// `parent` lies inside `child`'s own group).
pub fn attach_as_subtask(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    child: TaskHandle,
    parent: TaskHandle,
) -> bool {
    if child == parent || !model.contains(child) || !model.contains(parent) {
        return false;
    }
    if model.is_descendant_of(parent, child) {
        return false;
    }
    let target = task_after_group(model, parent);
    if target != Some(child) && !move_group_to(model, store, child, target) {
        return false;
    }
    // The move's neighborhood rule may have picked a deeper parent; the
    // adoption is explicit here.
    update_parent(model, store, child, Some(parent));
    debug_assert!(model.is_acyclic());
    true
}

/// Re-points `child`'s parent, persisting the link for persisted tasks.
pub(crate) fn update_parent(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    child: TaskHandle,
    parent: Option<TaskHandle>,
) {
    if !model.set_parent(child, parent) {
        return;
    }
    let child_id = match model.task(child) {
        Some(task) if task.is_persisted() => task.store_id,
        _ => return,
    };
    let parent_id = parent
        .and_then(|p| model.task(p))
        .filter(|p| p.is_persisted())
        .map(|p| p.store_id);
    if let Err(err) = store.set_parent_link(child_id, parent_id) {
        warn!("event=persist_parent module=order status=error task={child_id} error={err}");
    }
}

/// Removes `task` from the model and renumbers the remaining tasks densely.
///
/// Callers must detach children and dependency edges first; this only
/// removes the record and closes the gap in the order sequence.
pub(crate) fn remove_and_compact(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    task: TaskHandle,
) -> Option<crate::model::task::Task> {
    let removed = model.remove_task(task)?;
    for (index, handle) in model.sorted_tasks().into_iter().enumerate() {
        set_row(model, store, handle, index as i64);
    }
    Some(removed)
}

/// Writes one order index, persisting and publishing only on change.
pub(crate) fn set_row(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
    handle: TaskHandle,
    order_index: i64,
) {
    let (store_id, persisted) = match model.task(handle) {
        Some(task) if task.order_index != order_index => (task.store_id, task.is_persisted()),
        _ => return,
    };
    model.set_order_index(handle, order_index);
    if persisted {
        if let Err(err) = store.update_task_row(store_id, order_index) {
            warn!("event=persist_row module=order status=error task={store_id} error={err}");
        }
    }
}

fn row_of(model: &ProjectModel, handle: TaskHandle) -> i64 {
    model.task(handle).map(|task| task.order_index).unwrap_or(-1)
}

fn reparent_after_move(model: &mut ProjectModel, store: &mut dyn ProjectStore, task: TaskHandle) {
    let order = model.sorted_tasks();
    let index = match order.iter().position(|h| *h == task) {
        Some(index) => index,
        None => return,
    };
    let new_parent = if index == 0 {
        None
    } else {
        let above = order[index - 1];
        match model.task(above) {
            Some(record) if record.has_children() => Some(above),
            Some(record) => record.parent,
            None => None,
        }
    };
    update_parent(model, store, task, new_parent);
}

#[cfg(test)]
mod tests {
    use super::{attach_as_subtask, move_group_to, remove_and_compact, shift_rows, task_after_group};
    use crate::model::item::{ItemFields, StoreId};
    use crate::model::project::{Project, ProjectModel};
    use crate::model::task::TaskHandle;
    use crate::store::{ProjectRecord, ProjectSnapshot, ProjectStore, StoreResult, TaskRecord};

    /// Store stub for pure ordering tests; transient tasks never reach it.
    struct NullStore;

    impl ProjectStore for NullStore {
        fn create_project(&mut self, _: &ProjectRecord) -> StoreResult<StoreId> {
            Ok(1)
        }
        fn update_project(&mut self, _: &ProjectRecord) -> StoreResult<()> {
            Ok(())
        }
        fn create_task(&mut self, _: &TaskRecord) -> StoreResult<StoreId> {
            Ok(1)
        }
        fn update_task(&mut self, _: &TaskRecord) -> StoreResult<()> {
            Ok(())
        }
        fn update_task_row(&mut self, _: StoreId, _: i64) -> StoreResult<()> {
            Ok(())
        }
        fn set_parent_link(&mut self, _: StoreId, _: Option<StoreId>) -> StoreResult<()> {
            Ok(())
        }
        fn delete_task(&mut self, _: StoreId) -> StoreResult<()> {
            Ok(())
        }
        fn add_dependency_link(&mut self, _: StoreId, _: StoreId) -> StoreResult<()> {
            Ok(())
        }
        fn remove_dependency_link(&mut self, _: StoreId, _: StoreId) -> StoreResult<()> {
            Ok(())
        }
        fn add_worker_link(&mut self, _: StoreId, _: &str) -> StoreResult<()> {
            Ok(())
        }
        fn remove_worker_link(&mut self, _: StoreId, _: &str) -> StoreResult<()> {
            Ok(())
        }
        fn fetch_snapshot(&mut self, project: StoreId) -> StoreResult<ProjectSnapshot> {
            Err(crate::store::StoreError::NotFound(project))
        }
    }

    fn model_with(names: &[&str]) -> (ProjectModel, Vec<TaskHandle>) {
        let mut model = ProjectModel::new(Project::new(ItemFields::new("Demo", 0, None, 1)));
        let handles = names
            .iter()
            .map(|name| model.insert_task(ItemFields::new(*name, 0, None, 1)))
            .collect();
        (model, handles)
    }

    fn names_in_order(model: &ProjectModel) -> Vec<String> {
        model
            .sorted_tasks()
            .into_iter()
            .map(|h| model.task(h).unwrap().fields.name.clone())
            .collect()
    }

    fn rows_are_dense(model: &ProjectModel) -> bool {
        model
            .sorted_tasks()
            .iter()
            .enumerate()
            .all(|(i, h)| model.task(*h).unwrap().order_index == i as i64)
    }

    /// Base fixture: [A, B(C, D), E] with C and D as children of B.
    fn family_fixture() -> (ProjectModel, Vec<TaskHandle>) {
        let (mut model, handles) = model_with(&["A", "B", "C", "D", "E"]);
        let mut store = NullStore;
        let (b, c, d) = (handles[1], handles[2], handles[3]);
        assert!(attach_as_subtask(&mut model, &mut store, c, b));
        assert!(attach_as_subtask(&mut model, &mut store, d, b));
        assert_eq!(names_in_order(&model), ["A", "B", "C", "D", "E"]);
        (model, handles)
    }

    #[test]
    fn move_above_later_task_lands_directly_above_it() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        let (a, b, e) = (handles[0], handles[1], handles[4]);

        assert!(move_group_to(&mut model, &mut store, a, Some(e)));
        assert_eq!(names_in_order(&model), ["B", "C", "D", "A", "E"]);
        assert!(rows_are_dense(&model));
        // D is directly above A and childless, so A joins D's parent B.
        assert_eq!(model.task(a).unwrap().parent, Some(b));
        assert!(model.task(b).unwrap().children.contains(&a));
    }

    #[test]
    fn move_into_own_group_is_rejected_without_mutation() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        let (b, c, d) = (handles[1], handles[2], handles[3]);

        let before: Vec<_> = model
            .sorted_tasks()
            .iter()
            .map(|h| (*h, model.task(*h).unwrap().order_index, model.task(*h).unwrap().parent))
            .collect();
        assert!(!move_group_to(&mut model, &mut store, b, Some(c)));
        assert!(!move_group_to(&mut model, &mut store, b, Some(d)));
        let after: Vec<_> = model
            .sorted_tasks()
            .iter()
            .map(|h| (*h, model.task(*h).unwrap().order_index, model.task(*h).unwrap().parent))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn move_group_carries_all_descendants() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        let b = handles[1];

        assert!(move_group_to(&mut model, &mut store, b, None));
        assert_eq!(names_in_order(&model), ["A", "E", "B", "C", "D"]);
        assert!(rows_are_dense(&model));
        assert_eq!(model.task(handles[2]).unwrap().parent, Some(b));
        assert_eq!(model.task(handles[3]).unwrap().parent, Some(b));
    }

    #[test]
    fn move_to_top_makes_task_a_root() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        let (a, d) = (handles[0], handles[3]);

        assert!(move_group_to(&mut model, &mut store, d, Some(a)));
        assert_eq!(names_in_order(&model), ["D", "A", "B", "C", "E"]);
        assert_eq!(model.task(d).unwrap().parent, None);
        assert!(!model.task(handles[1]).unwrap().children.contains(&d));
        assert!(rows_are_dense(&model));
    }

    #[test]
    fn move_above_parent_with_children_joins_that_parent() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        let (b, c, e) = (handles[1], handles[2], handles[4]);

        // Place E directly above C (B's first child): the task above is B,
        // which has children, so E is adopted by B.
        assert!(move_group_to(&mut model, &mut store, e, Some(c)));
        assert_eq!(names_in_order(&model), ["A", "B", "E", "C", "D"]);
        assert_eq!(model.task(e).unwrap().parent, Some(b));
        assert!(rows_are_dense(&model));
    }

    #[test]
    fn move_to_end_when_already_last_is_a_no_op_success() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        let e = handles[4];

        assert!(move_group_to(&mut model, &mut store, e, None));
        assert_eq!(names_in_order(&model), ["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn move_onto_itself_succeeds_trivially() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        assert!(move_group_to(&mut model, &mut store, handles[0], Some(handles[0])));
        assert_eq!(names_in_order(&model), ["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn shift_rows_clamps_at_both_ends() {
        let (mut model, handles) = model_with(&["A", "B", "C"]);
        let mut store = NullStore;
        let (a, c) = (handles[0], handles[2]);

        assert!(shift_rows(&mut model, &mut store, c, -10));
        assert_eq!(names_in_order(&model), ["C", "A", "B"]);

        assert!(shift_rows(&mut model, &mut store, a, 10));
        assert_eq!(names_in_order(&model), ["C", "B", "A"]);
        assert!(rows_are_dense(&model));
    }

    #[test]
    fn attach_as_subtask_moves_child_next_to_parent_group() {
        let (mut model, handles) = model_with(&["P", "X", "Y"]);
        let mut store = NullStore;
        let (p, x, y) = (handles[0], handles[1], handles[2]);

        assert!(attach_as_subtask(&mut model, &mut store, y, p));
        assert_eq!(names_in_order(&model), ["P", "Y", "X"]);
        assert_eq!(model.task(y).unwrap().parent, Some(p));

        assert!(attach_as_subtask(&mut model, &mut store, x, p));
        assert_eq!(names_in_order(&model), ["P", "Y", "X"]);
        assert_eq!(model.task(p).unwrap().children, vec![y, x]);
    }

    #[test]
    fn attach_under_own_descendant_is_rejected() {
        let (mut model, handles) = family_fixture();
        let mut store = NullStore;
        assert!(!attach_as_subtask(&mut model, &mut store, handles[1], handles[2]));
    }

    #[test]
    fn task_after_group_skips_descendants() {
        let (model, handles) = family_fixture();
        assert_eq!(task_after_group(&model, handles[1]), Some(handles[4]));
        assert_eq!(task_after_group(&model, handles[4]), None);
        assert_eq!(task_after_group(&model, handles[2]), Some(handles[3]));
    }

    #[test]
    fn remove_and_compact_closes_the_gap() {
        let (mut model, handles) = model_with(&["A", "B", "C"]);
        let mut store = NullStore;
        let removed = remove_and_compact(&mut model, &mut store, handles[1]).unwrap();
        assert_eq!(removed.fields.name, "B");
        assert_eq!(names_in_order(&model), ["A", "C"]);
        assert!(rows_are_dense(&model));
    }
}
