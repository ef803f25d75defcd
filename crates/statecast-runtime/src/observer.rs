#![forbid(unsafe_code)]

//! Local property-changed observers for a single node.
//!
//! # Design
//!
//! Observers are stored as `Weak` callbacks; the strong `Rc` lives inside the
//! [`Subscription`] guard handed back to the caller. Dropping the guard makes
//! the callback unreachable, and the dead entry is pruned on the next
//! notification.
//!
//! # Invariants
//!
//! 1. Observers are notified in registration order.
//! 2. A dropped [`Subscription`] is never called again.
//! 3. Observers are notified even while the node is loading; the loading gate
//!    only applies to fan-out beyond the node.
//!
//! # Failure Modes
//!
//! - **Observer leak**: guards stored forever keep their callbacks alive.
//!   Dead weak references are cleaned lazily during `notify()`.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::state::FieldChange;

type CallbackRc = Rc<dyn Fn(&FieldChange)>;
type CallbackWeak = Weak<dyn Fn(&FieldChange)>;

/// Ordered list of weakly held observers.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<CallbackWeak>,
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("observer_count", &self.observers.len())
            .finish()
    }
}

impl ObserverList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. The returned guard keeps it alive.
    pub fn subscribe(&mut self, callback: impl Fn(&FieldChange) + 'static) -> Subscription {
        let strong: CallbackRc = Rc::new(callback);
        self.observers.push(Rc::downgrade(&strong));
        // `Rc<dyn Fn>` cannot coerce to `Rc<dyn Any>`, so box the Rc itself.
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of registered observers, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Prune dead observers and return the live ones, in order.
    ///
    /// Callers invoke the returned callbacks themselves so no borrow of the
    /// owning node is held during the calls.
    pub fn live(&mut self) -> Vec<CallbackRc> {
        self.observers.retain(|w| w.strong_count() > 0);
        self.observers.iter().filter_map(Weak::upgrade).collect()
    }

    /// Notify every live observer of `change`. Returns how many ran.
    pub fn notify(&mut self, change: &FieldChange) -> usize {
        let callbacks = self.live();
        for cb in &callbacks {
            cb(change);
        }
        callbacks.len()
    }
}

/// RAII guard for an observer callback.
///
/// Dropping the `Subscription` drops the only strong reference to the
/// callback, so it is skipped from the next notification onward.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
