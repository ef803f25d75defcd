#![forbid(unsafe_code)]

//! Root broadcast channel.
//!
//! Every committed, non-suppressed write ends by delivering a
//! [`BroadcastEvent`] to each listener attached at the root. Delivery is
//! fire-and-forget from the writer's point of view: a failing listener is
//! recorded as a fault and the remaining listeners still run.
//!
//! # Invariants
//!
//! 1. Listeners are called in attach order.
//! 2. The listener set is captured when a broadcast starts; listeners
//!    attached or detached during delivery take effect from the next
//!    broadcast.
//! 3. Listener ids are never reused within a channel.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use statecast_core::{FieldName, Value};

use crate::error::CallbackResult;
use crate::tree::{NodeId, StateTree};

/// A field change delivered to root listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastEvent {
    /// Node whose write produced the broadcast.
    pub origin: NodeId,
    pub field: FieldName,
    pub value: Value,
}

/// A tree-wide observer attached at the root.
///
/// Listeners receive the tree mutably and may write to it; such writes run
/// their own propagation chain nested inside the current one.
pub trait BroadcastListener {
    fn on_broadcast(&self, tree: &mut StateTree, event: &BroadcastEvent) -> CallbackResult;
}

impl<F> BroadcastListener for F
where
    F: Fn(&mut StateTree, &BroadcastEvent) -> CallbackResult,
{
    fn on_broadcast(&self, tree: &mut StateTree, event: &BroadcastEvent) -> CallbackResult {
        self(tree, event)
    }
}

/// Handle for a listener attached to a [`BroadcastChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Ordered set of root listeners.
#[derive(Default)]
pub struct BroadcastChannel {
    listeners: Vec<(ListenerId, Rc<dyn BroadcastListener>)>,
    next_id: u64,
}

impl fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("listeners", &self.listeners.iter().map(|(id, _)| *id).collect::<Vec<_>>())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl BroadcastChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, listener: impl BroadcastListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was attached.
    pub fn detach(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// The listener set for one delivery round, in attach order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ListenerId, Rc<dyn BroadcastListener>)> {
        self.listeners.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut StateTree, _: &BroadcastEvent) -> CallbackResult {
        Ok(())
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let mut channel = BroadcastChannel::new();
        let a = channel.attach(noop);
        let b = channel.attach(noop);
        assert!(a < b);
        let order: Vec<_> = channel.snapshot().iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn detach_is_idempotent() {
        let mut channel = BroadcastChannel::new();
        let a = channel.attach(noop);
        assert!(channel.detach(a));
        assert!(!channel.detach(a));
        assert!(channel.is_empty());
    }

    #[test]
    fn ids_not_reused_after_detach() {
        let mut channel = BroadcastChannel::new();
        let a = channel.attach(noop);
        channel.detach(a);
        let b = channel.attach(noop);
        assert_ne!(a, b);
    }

    #[test]
    fn event_serializes_origin_field_and_value() {
        let event = BroadcastEvent {
            origin: NodeId::from_raw(1, 0),
            field: "gate".into(),
            value: Value::from("B2"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["field"], "gate");
        assert_eq!(json["value"]["kind"], "text");
        assert_eq!(json["origin"]["index"], 1);
    }
}
