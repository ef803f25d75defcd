#![forbid(unsafe_code)]

//! Tree-level errors and collected propagation faults.
//!
//! A [`TreeError`] aborts the operation that raised it before any side effect
//! (a rejected write never notifies anyone). A [`PropagationFault`] is
//! recorded when a later step of an already-committed write fails; the
//! remaining steps still run and the faults are returned in the
//! [`PropagationReport`](crate::propagation::PropagationReport).

use std::fmt;

use statecast_core::{FieldName, StateError};

use crate::broadcast::ListenerId;
use crate::tree::NodeId;

/// Error type returned by handlers and broadcast listeners.
pub type CallbackError = Box<dyn std::error::Error>;

/// Result type returned by handlers and broadcast listeners.
pub type CallbackResult = Result<(), CallbackError>;

/// Errors from tree operations and field writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The id does not name a live node (never existed or was detached).
    UnknownNode(NodeId),
    /// The node rejected the operation.
    State { node: NodeId, error: StateError },
    /// The root cannot be detached.
    DetachRoot,
    /// Moving the node under the target would create a cycle.
    WouldCycle { node: NodeId, new_parent: NodeId },
    /// Nested propagation exceeded the configured depth.
    RecursionLimit {
        node: NodeId,
        field: FieldName,
        limit: usize,
    },
    /// The node arena ran out of addressable slots.
    ArenaFull,
}

impl TreeError {
    /// The underlying node error, if any.
    #[must_use]
    pub fn state_error(&self) -> Option<&StateError> {
        match self {
            Self::State { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "no live node {id}"),
            Self::State { node, error } => write!(f, "node {node}: {error}"),
            Self::DetachRoot => f.write_str("the root node cannot be detached"),
            Self::WouldCycle { node, new_parent } => {
                write!(f, "moving {node} under {new_parent} would create a cycle")
            }
            Self::RecursionLimit { node, field, limit } => write!(
                f,
                "write to '{field}' on {node} exceeds propagation depth {limit}"
            ),
            Self::ArenaFull => f.write_str("node arena is full"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::State { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// A failure in steps 3–5 of a committed write.
#[derive(Debug)]
pub enum PropagationFault {
    /// A child exposes the field with a different kind.
    ChildSync { child: NodeId, error: StateError },
    /// The node's handler for the field returned an error.
    Handler { error: CallbackError },
    /// A root listener returned an error.
    Broadcast {
        listener: ListenerId,
        error: CallbackError,
    },
    /// The writing node was detached before the broadcast step.
    Orphaned,
}

impl fmt::Display for PropagationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChildSync { child, error } => write!(f, "child sync into {child}: {error}"),
            Self::Handler { error } => write!(f, "handler failed: {error}"),
            Self::Broadcast { listener, error } => {
                write!(f, "broadcast listener {listener} failed: {error}")
            }
            Self::Orphaned => f.write_str("node detached before broadcast"),
        }
    }
}

impl std::error::Error for PropagationFault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_error_is_the_source() {
        let err = TreeError::State {
            node: NodeId::from_raw(2, 0),
            error: StateError::UnknownField("x".into()),
        };
        assert_eq!(err.state_error(), Some(&StateError::UnknownField("x".into())));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "node #2v0: unknown field 'x'");
    }

    #[test]
    fn fault_display_mentions_listener() {
        let fault = PropagationFault::Broadcast {
            listener: ListenerId::from_raw(3),
            error: "sink closed".into(),
        };
        assert_eq!(fault.to_string(), "broadcast listener L3 failed: sink closed");
    }
}
