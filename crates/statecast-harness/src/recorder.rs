#![forbid(unsafe_code)]

//! Records what the propagation protocol did, in order.
//!
//! One [`EventRecorder`] can watch any number of nodes (local observers),
//! act as a handler, and listen at the root. All three feed the same log, so
//! tests can assert on the interleaving of steps across nested chains.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use statecast_core::{FieldName, Value};
use statecast_runtime::{
    BroadcastEvent, CallbackResult, FieldChange, ListenerId, NodeId, StateTree, Subscription,
    TreeResult,
};

/// One observed protocol step.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// Step 1: a local observer saw the change.
    Notify {
        node: NodeId,
        field: FieldName,
        value: Value,
    },
    /// Step 4: the node's handler ran.
    Handler {
        node: NodeId,
        field: FieldName,
        previous: Value,
        value: Value,
    },
    /// Step 5: a root listener received the broadcast.
    Broadcast {
        origin: NodeId,
        field: FieldName,
        value: Value,
    },
}

impl Recorded {
    #[must_use]
    pub fn field(&self) -> &FieldName {
        match self {
            Self::Notify { field, .. } | Self::Handler { field, .. } | Self::Broadcast { field, .. } => {
                field
            }
        }
    }

    #[must_use]
    pub fn is_notify(&self) -> bool {
        matches!(self, Self::Notify { .. })
    }

    #[must_use]
    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast { .. })
    }
}

impl fmt::Display for Recorded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify { node, field, value } => write!(f, "notify {node} {field}={value}"),
            Self::Handler {
                node,
                field,
                previous,
                value,
            } => write!(f, "handler {node} {field}: {previous} -> {value}"),
            Self::Broadcast {
                origin,
                field,
                value,
            } => write!(f, "broadcast {origin} {field}={value}"),
        }
    }
}

/// Shared, append-only protocol log.
///
/// Cloning yields another handle to the same log.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<Recorded>>>,
    subscriptions: Rc<RefCell<Vec<Subscription>>>,
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("events", &self.events.borrow().len())
            .field("subscriptions", &self.subscriptions.borrow().len())
            .finish()
    }
}

impl EventRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record local notifications of `id`. The subscription lives as long as
    /// the recorder.
    pub fn observe(&self, tree: &mut StateTree, id: NodeId) -> TreeResult<()> {
        let events = Rc::clone(&self.events);
        let sub = tree.subscribe(id, move |change: &FieldChange| {
            events.borrow_mut().push(Recorded::Notify {
                node: change.node,
                field: change.field.clone(),
                value: change.value.clone(),
            });
        })?;
        self.subscriptions.borrow_mut().push(sub);
        Ok(())
    }

    /// Observe every node currently in the tree.
    pub fn observe_all(&self, tree: &mut StateTree) -> TreeResult<()> {
        for id in tree.node_ids() {
            self.observe(tree, id)?;
        }
        Ok(())
    }

    /// A handler that records its invocation and succeeds.
    pub fn handler(&self) -> impl Fn(&mut StateTree, &FieldChange) -> CallbackResult + 'static {
        let events = Rc::clone(&self.events);
        move |_, change| {
            events.borrow_mut().push(Recorded::Handler {
                node: change.node,
                field: change.field.clone(),
                previous: change.previous.clone(),
                value: change.value.clone(),
            });
            Ok(())
        }
    }

    /// Install [`handler`](Self::handler) for `field` on `id`.
    pub fn handle(&self, tree: &mut StateTree, id: NodeId, field: &str) -> TreeResult<()> {
        tree.add_handler(id, field, self.handler())
    }

    /// Attach a root listener that records every broadcast.
    pub fn listen(&self, tree: &mut StateTree) -> ListenerId {
        let events = Rc::clone(&self.events);
        tree.listen(
            move |_: &mut StateTree, event: &BroadcastEvent| -> CallbackResult {
                events.borrow_mut().push(Recorded::Broadcast {
                    origin: event.origin,
                    field: event.field.clone(),
                    value: event.value.clone(),
                });
                Ok(())
            },
        )
    }

    #[must_use]
    pub fn events(&self) -> Vec<Recorded> {
        self.events.borrow().clone()
    }

    /// The log rendered one event per line.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.events.borrow().iter().map(ToString::to_string).collect()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&Recorded) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    #[must_use]
    pub fn broadcasts(&self) -> usize {
        self.count(Recorded::is_broadcast)
    }

    #[must_use]
    pub fn handler_calls(&self) -> usize {
        self.count(Recorded::is_handler)
    }

    #[must_use]
    pub fn notifications(&self) -> usize {
        self.count(Recorded::is_notify)
    }
}
