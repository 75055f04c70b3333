//! Entity model: project, task, shared fields, and change events.
//!
//! # Responsibility
//! - Define the canonical in-memory records edited by commands.
//! - Keep store identity (assigned by the external store) separate from
//!   session handles (assigned by the arena).
//!
//! # Invariants
//! - Mutating model access is crate-internal; callers outside the crate go
//!   through commands so undo coverage cannot be bypassed.
//! - Deletion notifications are the contract for observers to drop handles.

pub mod event;
pub mod item;
pub mod project;
pub mod task;
