//! Reconciliation between the in-memory model and store snapshots.
//!
//! # Responsibility
//! - Upgrade transient identities in place and broadcast the swap.
//! - Fold a freshly fetched store snapshot into the live model.
//!
//! # Invariants
//! - Handles survive a refresh whenever the store identity matches, so
//!   live commands and observers keep resolving the same records.
//! - Transient (not yet persisted) local tasks are never dropped by a
//!   refresh; they are renumbered after the snapshot's tasks.
//! - The store is authoritative during a refresh; no store writes happen
//!   here.

use crate::history::CommandHistory;
use crate::model::event::ModelEvent;
use crate::model::item::{ItemFields, StoreId};
use crate::model::project::ProjectModel;
use crate::model::task::TaskHandle;
use crate::store::{ProjectSnapshot, ProjectStore, StoreResult, TaskRecord};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};

/// Counts of what a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Records whose fields, order, or links changed.
    pub updated: usize,
    /// Records newly observed in the snapshot.
    pub inserted: usize,
    /// Persisted local records absent from the snapshot.
    pub deleted: usize,
    /// Commands evicted from history because a reference died.
    pub evicted: usize,
}

/// Persists a still-transient project record and upgrades its identity.
///
/// No-op when the project already has a store identity.
pub fn persist_project(
    model: &mut ProjectModel,
    store: &mut dyn ProjectStore,
) -> StoreResult<StoreId> {
    if crate::model::item::is_persisted(model.project().store_id) {
        return Ok(model.project().store_id);
    }
    if model.project().fields.created_at == 0 {
        model.project_mut().fields.created_at = crate::model::item::now_ms();
    }
    let record = crate::command::project_record(model.project());
    let store_id = store.create_project(&record)?;
    model.project_mut().store_id = store_id;
    model.publish(ModelEvent::ProjectUpdated);
    debug!("event=persist_project module=reconcile status=ok project={store_id}");
    Ok(store_id)
}

/// Upgrades a task's transient identity after the store accepted its
/// insert, and tells live commands about the swap.
pub fn assign_identity(
    model: &mut ProjectModel,
    history: &mut CommandHistory,
    handle: TaskHandle,
    store_id: StoreId,
) {
    let old_id = match model.task(handle) {
        Some(task) if task.store_id != store_id => task.store_id,
        _ => return,
    };
    model.set_store_id(handle, store_id);
    history.notify_identity_reassigned(old_id, store_id);
    debug!("event=assign_identity module=reconcile status=ok old={old_id} new={store_id}");
}

/// Folds a store snapshot into the live model.
///
/// Matching is by store identity. Matched records are updated in place,
/// unseen snapshot records are inserted under fresh handles, and persisted
/// local records missing from the snapshot are deleted. History is then
/// given the chance to evict commands whose references died.
pub fn apply_refresh(
    model: &mut ProjectModel,
    history: &mut CommandHistory,
    snapshot: &ProjectSnapshot,
) -> RefreshOutcome {
    let mut outcome = RefreshOutcome::default();

    refresh_project(model, snapshot, &mut outcome);

    let mut handle_of: HashMap<StoreId, TaskHandle> = HashMap::new();
    for record in &snapshot.tasks {
        let handle = match model.find_by_store_id(record.store_id) {
            Some(handle) => {
                if refresh_task_fields(model, handle, record) {
                    outcome.updated += 1;
                }
                handle
            }
            None => {
                let handle = model.insert_task(task_fields(record));
                model.set_store_id(handle, record.store_id);
                if let Some(task) = model.task_mut(handle) {
                    task.dirty = true;
                }
                outcome.inserted += 1;
                handle
            }
        };
        handle_of.insert(record.store_id, handle);
    }

    // Persisted local tasks the snapshot no longer contains are gone.
    let stale: Vec<TaskHandle> = model
        .sorted_tasks()
        .into_iter()
        .filter(|handle| {
            model.task(*handle).map_or(false, |task| {
                task.is_persisted() && !handle_of.contains_key(&task.store_id)
            })
        })
        .collect();
    for handle in stale {
        if let Some(task) = model.task(handle) {
            for child in task.children.clone() {
                model.set_parent(child, None);
            }
        }
        model.sever_dependencies_to(handle);
        model.set_parent(handle, None);
        model.remove_task(handle);
        outcome.deleted += 1;
    }

    // Second pass: links resolve only once every snapshot task has a
    // handle.
    for record in &snapshot.tasks {
        let handle = match handle_of.get(&record.store_id) {
            Some(handle) => *handle,
            None => continue,
        };
        let parent = record.parent_id.and_then(|id| handle_of.get(&id).copied());
        if model.set_parent(handle, parent) {
            outcome.updated += 1;
        }
        let wanted: BTreeSet<TaskHandle> = record
            .dependencies
            .iter()
            .filter_map(|id| handle_of.get(id).copied())
            .collect();
        let current = model
            .task(handle)
            .map(|task| task.dependencies.clone())
            .unwrap_or_default();
        if current != wanted {
            for gone in current.difference(&wanted) {
                model.remove_dependency(handle, *gone);
            }
            for new in wanted.difference(&current) {
                model.add_dependency(handle, *new);
            }
            outcome.updated += 1;
        }
    }

    renumber(model, snapshot, &handle_of);

    outcome.evicted = history.notify_model_refresh(model);
    info!(
        "event=refresh module=reconcile status=ok updated={} inserted={} deleted={} evicted={}",
        outcome.updated, outcome.inserted, outcome.deleted, outcome.evicted
    );
    outcome
}

fn refresh_project(model: &mut ProjectModel, snapshot: &ProjectSnapshot, outcome: &mut RefreshOutcome) {
    let record = &snapshot.project;
    let project = model.project();
    let changed = project.store_id != record.store_id
        || project.fields.name != record.name
        || project.fields.start_date != record.start_date
        || project.fields.end_date != record.end_date
        || project.fields.description != record.description
        || project.fields.created_at != record.created_at
        || project.fields.creator != record.creator
        || project.fields.likely_duration != record.likely_duration
        || project.fields.min_duration != record.min_duration
        || project.fields.max_duration != record.max_duration;
    if !changed {
        return;
    }
    let project = model.project_mut();
    project.store_id = record.store_id;
    project.fields.name = record.name.clone();
    project.fields.start_date = record.start_date;
    project.fields.end_date = record.end_date;
    project.fields.description = record.description.clone();
    project.fields.created_at = record.created_at;
    project.fields.creator = record.creator.clone();
    project.fields.likely_duration = record.likely_duration;
    project.fields.min_duration = record.min_duration;
    project.fields.max_duration = record.max_duration;
    project.dirty = true;
    model.publish(ModelEvent::ProjectUpdated);
    outcome.updated += 1;
}

/// Applies a snapshot record's fields onto a matched task. Returns `true`
/// when anything changed.
fn refresh_task_fields(model: &mut ProjectModel, handle: TaskHandle, record: &TaskRecord) -> bool {
    let wanted = task_fields(record);
    let changed = match model.task(handle) {
        Some(task) => task.fields != wanted,
        None => return false,
    };
    if !changed {
        return false;
    }
    if let Some(task) = model.task_mut(handle) {
        task.fields = wanted;
        task.dirty = true;
    }
    model.publish(ModelEvent::TaskUpdated(handle));
    true
}

fn task_fields(record: &TaskRecord) -> ItemFields {
    ItemFields {
        name: record.name.clone(),
        start_date: record.start_date,
        end_date: record.end_date,
        description: record.description.clone(),
        created_at: record.created_at,
        creator: record.creator.clone(),
        workers: record.workers.iter().cloned().collect(),
        likely_duration: record.likely_duration,
        min_duration: record.min_duration,
        max_duration: record.max_duration,
    }
}

/// Rebuilds the dense order: snapshot tasks first in snapshot order, then
/// surviving transient tasks in their previous relative order.
fn renumber(
    model: &mut ProjectModel,
    snapshot: &ProjectSnapshot,
    handle_of: &HashMap<StoreId, TaskHandle>,
) {
    let mut next = 0i64;
    for record in &snapshot.tasks {
        if let Some(handle) = handle_of.get(&record.store_id) {
            model.set_order_index(*handle, next);
            next += 1;
        }
    }
    let transient: Vec<TaskHandle> = model
        .sorted_tasks()
        .into_iter()
        .filter(|handle| model.task(*handle).map_or(false, |task| !task.is_persisted()))
        .collect();
    for handle in transient {
        model.set_order_index(handle, next);
        next += 1;
    }
}
