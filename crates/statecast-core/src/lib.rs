#![forbid(unsafe_code)]

//! Core: values, field descriptors, node schemas, and field storage.
//!
//! # Role in statecast
//! `statecast-core` defines *what* a node holds. Every node of a given type
//! shares one [`NodeSchema`], a declaration-ordered table of
//! [`FieldDescriptor`]s fixing each field's name, kind, registry exposure,
//! and clone policy. A [`FieldTable`] stores the values for one node and
//! enforces the schema on every access.
//!
//! # How it fits in the system
//! The runtime (`statecast-runtime`) wraps a `FieldTable` in a
//! `SubscribableState` node, places nodes in a tree, and runs the
//! propagation protocol on every changing write. Nothing here knows about
//! trees, observers, or broadcast.

pub mod error;
pub mod field;
pub mod schema;
pub mod table;
pub mod value;

pub use error::{StateError, StateResult};
pub use field::{
    ClonePolicy, Exposure, Field, FieldDescriptor, FieldName, LOADING, LOADING_FIELD,
};
pub use schema::{NodeSchema, SchemaBuilder};
pub use table::{FieldRegistry, FieldTable};
pub use value::{FieldKind, FieldType, Value};
