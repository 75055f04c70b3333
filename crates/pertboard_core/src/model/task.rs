//! Task record.
//!
//! # Responsibility
//! - Hold per-task identity, scheduling fields, hierarchy, and ordering.
//!
//! # Invariants
//! - `handle` is arena-assigned, stable for the session, never reused.
//! - `store_id` starts transient and is upgraded in place exactly once
//!   (plus after undo of a delete, when the store re-creates the row).
//! - `children` lists direct child handles in adoption order; display
//!   order is governed by `order_index` alone.

use crate::model::item::{is_persisted, ItemFields, StoreId, TRANSIENT_ID};
use serde::Serialize;
use std::collections::BTreeSet;

/// Stable in-session handle for a task, independent of its store identity.
///
/// Commands and observers hold handles; identity reassignment from the
/// store rewrites `Task::store_id` without invalidating any handle.
pub type TaskHandle = u64;

/// A single row on the chart: one task plus its hierarchy and ordering state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    /// Arena handle, see [`TaskHandle`].
    pub handle: TaskHandle,
    /// Store identity, `TRANSIENT_ID` until the store accepts the insert.
    pub store_id: StoreId,
    /// Shared timed-item fields.
    pub fields: ItemFields,
    /// Structural parent. `None` means root-level task.
    pub parent: Option<TaskHandle>,
    /// Direct children, in adoption order.
    pub children: Vec<TaskHandle>,
    /// Tasks that cannot start until this one is finished.
    pub dependencies: BTreeSet<TaskHandle>,
    /// Dense position in the project's flattened sequence.
    pub order_index: i64,
    /// Set when a refresh snapshot changed this record.
    pub dirty: bool,
}

impl Task {
    /// Creates a transient task record at the given order position.
    pub fn new(handle: TaskHandle, fields: ItemFields, order_index: i64) -> Self {
        Self {
            handle,
            store_id: TRANSIENT_ID,
            fields,
            parent: None,
            children: Vec::new(),
            dependencies: BTreeSet::new(),
            order_index,
            dirty: false,
        }
    }

    /// Returns whether the store has assigned a permanent identity.
    pub fn is_persisted(&self) -> bool {
        is_persisted(self.store_id)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }
}
