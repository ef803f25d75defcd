#![forbid(unsafe_code)]

//! Node schemas: the per-node-type field descriptor table.
//!
//! A schema is built once with [`SchemaBuilder`] and shared (via `Arc`) by
//! every node of that type. Field lookups go through the schema, so a name
//! that was never declared is rejected instead of silently ignored.
//!
//! # Invariants
//!
//! 1. Field names are unique within a schema.
//! 2. Declaration order is preserved; index `i` of a schema always refers to
//!    the same descriptor.
//! 3. The built-in [`LOADING_FIELD`] descriptor (`bool`, default `false`) is
//!    present in every schema at index 0.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{StateError, StateResult};
use crate::field::{Exposure, Field, FieldDescriptor, FieldName, LOADING_FIELD};
use crate::value::{FieldType, Value};

/// Ordered, immutable field descriptor table for one node type.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSchema {
    type_name: String,
    fields: IndexMap<FieldName, FieldDescriptor>,
}

impl NodeSchema {
    /// Start building a schema for the named node type.
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    /// Node type name, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Look up a descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Position of a field in declaration order.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    /// Position and descriptor of a field.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields.get_full(name).map(|(index, _, d)| (index, d))
    }

    /// Descriptor at a declaration index.
    #[must_use]
    pub fn descriptor(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get_index(index).map(|(_, d)| d)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of declared fields, including the built-in loading flag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false: the loading flag is always declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Whether the loading flag is part of the field registry.
    #[must_use]
    pub fn syncs_loading(&self) -> bool {
        self.fields
            .get(LOADING_FIELD)
            .is_some_and(FieldDescriptor::is_synced)
    }
}

/// Builder for [`NodeSchema`].
///
/// Errors (duplicate or reserved names) are deferred to [`build`](Self::build)
/// so declarations can be chained.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    loading: Exposure,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            loading: Exposure::Private,
            fields: Vec::new(),
        }
    }

    /// Declare a field from a full descriptor.
    #[must_use]
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Declare a private field.
    #[must_use]
    pub fn private(self, name: impl Into<FieldName>, default: impl Into<Value>) -> Self {
        self.field(FieldDescriptor::new(name, default))
    }

    /// Declare a field listed in the field registry.
    #[must_use]
    pub fn synced(self, name: impl Into<FieldName>, default: impl Into<Value>) -> Self {
        self.field(FieldDescriptor::new(name, default).synced())
    }

    /// Declare a field from a typed key.
    #[must_use]
    pub fn typed<T: FieldType>(self, key: Field<T>, default: T, exposure: Exposure) -> Self {
        self.field(FieldDescriptor::typed(key, default).with_exposure(exposure))
    }

    /// List the built-in loading flag in the field registry, so a parent
    /// entering or leaving loading pushes the flag into this node.
    #[must_use]
    pub fn sync_loading(mut self) -> Self {
        self.loading = Exposure::Synced;
        self
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> StateResult<NodeSchema> {
        let mut fields = IndexMap::with_capacity(self.fields.len() + 1);
        let loading = FieldDescriptor::new(LOADING_FIELD, false).with_exposure(self.loading);
        fields.insert(loading.name().clone(), loading);

        for descriptor in self.fields {
            let name = descriptor.name().clone();
            if name == LOADING_FIELD {
                return Err(StateError::ReservedField(name));
            }
            if fields.contains_key(&name) {
                return Err(StateError::DuplicateField(name));
            }
            fields.insert(name, descriptor);
        }

        Ok(NodeSchema {
            type_name: self.type_name,
            fields,
        })
    }

    /// Validate, freeze, and wrap the schema for sharing between nodes.
    pub fn build_shared(self) -> StateResult<Arc<NodeSchema>> {
        self.build().map(Arc::new)
    }
}
