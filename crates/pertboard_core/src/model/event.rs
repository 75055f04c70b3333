//! Typed model change events and subscriber registry.
//!
//! # Responsibility
//! - Broadcast entity update/delete notifications to UI-side observers.
//! - Keep subscriber lifetimes out of the model's hands.
//!
//! # Invariants
//! - Subscribers are held as `Weak` references; a dropped subscriber is
//!   pruned on the next publish, never kept alive by the model.
//! - `TaskDeleted` is the signal for observers to drop their handle.

use crate::model::task::TaskHandle;
use serde::Serialize;
use std::rc::{Rc, Weak};

/// Change notification emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "task")]
pub enum ModelEvent {
    /// A task's fields, order index, or relations changed.
    TaskUpdated(TaskHandle),
    /// A task was removed; observers must drop the handle.
    TaskDeleted(TaskHandle),
    /// The project record changed.
    ProjectUpdated,
}

/// Receiver contract for model change notifications.
///
/// Implementors needing mutation use interior mutability; the bus only
/// hands out shared references.
pub trait ModelSubscriber {
    fn on_event(&self, event: ModelEvent);
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

/// Weak-reference publish/subscribe registry.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Weak<dyn ModelSubscriber>)>,
    next_id: SubscriptionId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns its unsubscribe token.
    pub fn subscribe(&mut self, subscriber: &Rc<dyn ModelSubscriber>) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Rc::downgrade(subscriber)));
        id
    }

    /// Removes a subscriber by token. Unknown tokens are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Delivers an event to all live subscribers, pruning dead ones.
    pub fn publish(&mut self, event: ModelEvent) {
        self.subscribers.retain(|(_, weak)| match weak.upgrade() {
            Some(subscriber) => {
                subscriber.on_event(event);
                true
            }
            None => false,
        });
    }

    /// Number of currently registered (possibly dead) subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
