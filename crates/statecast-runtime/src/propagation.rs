#![forbid(unsafe_code)]

//! The change-propagation protocol.
//!
//! Every write that changes a stored value runs, in this order:
//!
//! ```text
//! set_field(N, F, v)
//!   │  unknown F / wrong kind ──► Err, nothing happens
//!   │  v == current           ──► Ok(unchanged), nothing happens
//!   ▼
//! 1. local notify     observers of N            (always)
//! 2. loading gate     N.is_loading?             ──► stop, report suppressed
//! 3. child sync       direct children exposing F receive v (no cascade)
//! 4. handler          N's handler for F, given the FieldChange
//! 5. root broadcast   walk to the root, deliver (N, F, F's current value)
//!                     to every listener
//! ```
//!
//! # Invariants
//!
//! 1. Step 1 never depends on the outcome of steps 2–5.
//! 2. The loading flag is read at step 2 of this write, not cached earlier.
//! 3. Child sync is a plain assignment: it never notifies the child's
//!    observers, runs the child's handler, or reaches grandchildren.
//! 4. A failure in one child, the handler, or one listener is recorded in the
//!    report and the remaining work still runs.
//! 5. Suppressed changes are never replayed when loading ends.
//! 6. The broadcast carries the value stored when step 5 runs, so a handler
//!    that rewrites its own field leaves listeners holding the final value.
//!
//! # Re-entrancy
//!
//! Handlers and listeners get `&mut StateTree` and may write again; the
//! nested chain runs to completion before the outer one continues. At most
//! `PropagationConfig::max_depth` chains may be active at once. A nested
//! write beyond that bound fails with `TreeError::RecursionLimit` unless it
//! is a no-op, so a cycle that settles on a fixed point terminates cleanly.

use statecast_core::{Field, FieldType, LOADING, Value};
use tracing::{debug, trace_span, warn};

use crate::broadcast::BroadcastEvent;
use crate::error::{PropagationFault, TreeError, TreeResult};
use crate::state::FieldChange;
use crate::tree::{NodeId, StateTree};

/// What a single write did.
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// The stored value changed (false for no-op writes).
    pub changed: bool,
    /// Steps 3–5 were skipped because the node was loading.
    pub suppressed: bool,
    /// Local observers called in step 1.
    pub observers_notified: usize,
    /// Children that accepted the value in step 3, in visit order.
    pub synced_children: Vec<NodeId>,
    /// Whether a handler ran in step 4.
    pub handler_invoked: bool,
    /// Root listeners called in step 5.
    pub listeners_notified: usize,
    /// Failures collected from steps 3–5.
    pub faults: Vec<PropagationFault>,
}

impl PropagationReport {
    fn unchanged() -> Self {
        Self::default()
    }

    /// True when no step reported a fault.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    /// Whether the change reached the root listeners.
    #[must_use]
    pub fn broadcast(&self) -> bool {
        self.changed && !self.suppressed && self.listeners_notified > 0
    }
}

impl StateTree {
    /// Read a field of a node.
    pub fn get(&self, id: NodeId, field: &str) -> TreeResult<&Value> {
        self.node(id)?.get(field).map_err(Self::state_error(id))
    }

    /// Read a field through a typed key.
    pub fn get_as<T: FieldType>(&self, id: NodeId, key: Field<T>) -> TreeResult<T> {
        self.node(id)?.get_as(key).map_err(Self::state_error(id))
    }

    pub fn is_loading(&self, id: NodeId) -> TreeResult<bool> {
        Ok(self.node(id)?.is_loading())
    }

    /// Write a field and run the propagation protocol if the value changed.
    pub fn set_field(
        &mut self,
        id: NodeId,
        field: &str,
        value: impl Into<Value>,
    ) -> TreeResult<PropagationReport> {
        let value = value.into();
        let limit = self.config().max_depth;

        if self.depth >= limit {
            self.node(id)?
                .check(field, &value)
                .map_err(Self::state_error(id))?;
            let current = self.get(id, field)?;
            if *current == value {
                return Ok(PropagationReport::unchanged());
            }
            warn!(node = %id, field, limit, "propagation depth exceeded");
            return Err(TreeError::RecursionLimit {
                node: id,
                field: field.into(),
                limit,
            });
        }

        let state = self.node_mut(id)?;
        let Some(previous) = state
            .write(field, value.clone())
            .map_err(Self::state_error(id))?
        else {
            return Ok(PropagationReport::unchanged());
        };
        // Reuse the schema's interned name rather than allocating a new one.
        let name = state
            .schema()
            .get(field)
            .map_or_else(|| field.into(), |d| d.name().clone());

        let change = FieldChange {
            node: id,
            field: name,
            previous,
            value,
        };

        self.depth += 1;
        let report = self.propagate(&change);
        self.depth -= 1;
        Ok(report)
    }

    /// Typed write.
    pub fn set<T: FieldType>(
        &mut self,
        id: NodeId,
        key: Field<T>,
        value: T,
    ) -> TreeResult<PropagationReport> {
        self.set_field(id, key.name(), value.into_value())
    }

    /// Enter or leave the loading state. This is an ordinary write of the
    /// built-in loading field.
    pub fn set_loading(&mut self, id: NodeId, loading: bool) -> TreeResult<PropagationReport> {
        self.set(id, LOADING, loading)
    }

    /// Run `f` with `id` loading, then restore the previous flag.
    ///
    /// Writes made to `id` inside `f` notify local observers only. Leaving
    /// loading does not replay them.
    pub fn with_loading<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut StateTree) -> R,
    ) -> TreeResult<R> {
        let was_loading = self.is_loading(id)?;
        self.set_loading(id, true)?;
        let out = f(self);
        if self.contains(id) {
            self.set_loading(id, was_loading)?;
        }
        Ok(out)
    }

    /// Execute a node command by name. Returns `false` when the command is
    /// unknown or disabled.
    pub fn execute_command(&self, id: NodeId, name: &str) -> TreeResult<bool> {
        Ok(self.node(id)?.commands().execute(name))
    }

    fn propagate(&mut self, change: &FieldChange) -> PropagationReport {
        let id = change.node;
        let span = trace_span!("propagate", node = %id, field = %change.field, depth = self.depth);
        let _guard = span.enter();

        let mut report = PropagationReport {
            changed: true,
            ..PropagationReport::default()
        };

        // 1. Local notify.
        let Ok(state) = self.node_mut(id) else {
            report.faults.push(PropagationFault::Orphaned);
            return report;
        };
        report.observers_notified = state.observers_mut().notify(change);

        // 2. Loading gate.
        if state.is_loading() {
            report.suppressed = true;
            debug!(node = %id, field = %change.field, "propagation suppressed while loading");
            return report;
        }

        // 3. Child sync.
        let children = self.children(id).map(<[NodeId]>::to_vec).unwrap_or_default();
        for child in children {
            let Ok(child_state) = self.node_mut(child) else {
                continue;
            };
            match child_state.receive(change.field.as_str(), change.value.clone()) {
                Ok(true) => report.synced_children.push(child),
                Ok(false) => {}
                Err(error) => {
                    warn!(node = %id, child = %child, %error, "child sync failed");
                    report.faults.push(PropagationFault::ChildSync { child, error });
                }
            }
        }

        // 4. Handler.
        let handler = self.node(id).ok().and_then(|s| s.handler(change.field.as_str()));
        if let Some(handler) = handler {
            report.handler_invoked = true;
            if let Err(error) = handler(self, change) {
                warn!(node = %id, field = %change.field, %error, "handler failed");
                report.faults.push(PropagationFault::Handler { error });
            }
        }

        // 5. Root broadcast.
        match self.root_of(id) {
            Ok(root) => {
                debug_assert_eq!(root, self.root());
                let value = self
                    .get(id, change.field.as_str())
                    .map_or_else(|_| change.value.clone(), Clone::clone);
                let event = BroadcastEvent {
                    origin: id,
                    field: change.field.clone(),
                    value,
                };
                for (listener, callback) in self.channel.snapshot() {
                    report.listeners_notified += 1;
                    if let Err(error) = callback.on_broadcast(self, &event) {
                        warn!(%listener, field = %event.field, %error, "broadcast listener failed");
                        report.faults.push(PropagationFault::Broadcast { listener, error });
                    }
                }
            }
            Err(_) => {
                debug!(node = %id, "node detached before broadcast");
                report.faults.push(PropagationFault::Orphaned);
            }
        }

        report
    }
}
