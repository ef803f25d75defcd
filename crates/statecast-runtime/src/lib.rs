#![forbid(unsafe_code)]

//! Runtime: state nodes, the node tree, and change propagation.
//!
//! # Role in statecast
//! `statecast-runtime` turns the field tables of `statecast-core` into live,
//! observable nodes and arranges them in a single-rooted tree. A changing
//! write on any node runs the propagation protocol: local observers first,
//! then (unless the node is loading) a silent push into children that expose
//! the field, the node's own handler, and a broadcast to listeners at the
//! root.
//!
//! # Primary responsibilities
//! - **SubscribableState**: per-node fields, handlers, commands, observers.
//! - **StateTree**: arena-backed hierarchy with generational [`NodeId`]s.
//! - **Propagation**: the five-step protocol and its [`PropagationReport`].
//! - **Broadcast**: root listeners, including the JSONL evidence listener.
//!
//! # How it fits in the system
//! Applications declare node types with `statecast_core::NodeSchema`, build
//! nodes with [`SubscribableState::builder`], and drive every mutation
//! through [`StateTree::set_field`] (or the typed [`StateTree::set`]).
//! `statecast-harness` records the resulting event streams for tests.

pub mod broadcast;
pub mod command;
pub mod config;
pub mod error;
pub mod evidence_sink;
pub mod observer;
pub mod propagation;
pub mod snapshot;
pub mod state;
pub mod tree;

pub use broadcast::{BroadcastChannel, BroadcastEvent, BroadcastListener, ListenerId};
pub use command::{Command, CommandTable, RelayCommand};
pub use config::{DEFAULT_MAX_DEPTH, PropagationConfig};
pub use error::{CallbackError, CallbackResult, PropagationFault, TreeError, TreeResult};
pub use evidence_sink::{
    EvidenceListener, EvidenceSink, EvidenceSinkConfig, EvidenceSinkDestination,
};
pub use observer::{ObserverList, Subscription};
pub use propagation::PropagationReport;
pub use snapshot::{NodeSnapshot, TreeSnapshot};
pub use state::{FieldChange, Handler, StateBuilder, SubscribableState};
pub use tree::{NodeId, StateTree};

pub use statecast_core::{
    ClonePolicy, Exposure, Field, FieldDescriptor, FieldKind, FieldName, FieldType, LOADING,
    NodeSchema, StateError, Value,
};
