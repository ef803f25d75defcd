#![forbid(unsafe_code)]

//! Field names, typed field keys, and field descriptors.
//!
//! A [`FieldDescriptor`] is the per-field entry of a node schema. It fixes the
//! field's name and kind for the lifetime of every node built from that
//! schema, and carries two policies:
//!
//! - [`Exposure`]: whether the field is part of the node's field registry,
//!   i.e. whether a parent's write to a field of the same name is copied
//!   into it.
//! - [`ClonePolicy`]: what a cloned node receives for the field.

use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{FieldKind, FieldType, Value};

/// Name of the built-in loading flag present on every schema.
pub const LOADING_FIELD: &str = "is_loading";

/// Typed key for the built-in loading flag.
pub const LOADING: Field<bool> = Field::new(LOADING_FIELD);

/// Interned, cheaply clonable field name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldName(Arc<str>);

impl FieldName {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FieldName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl PartialEq<str> for FieldName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for FieldName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Debug for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FieldName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FieldName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// A field name bound to a Rust type.
///
/// Declaring keys as constants keeps the name and the type in one place:
///
/// ```
/// use statecast_core::field::Field;
///
/// const ALTITUDE: Field<i64> = Field::new("altitude");
/// assert_eq!(ALTITUDE.name(), "altitude");
/// ```
pub struct Field<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: FieldType> Field<T> {
    /// The kind a value written through this key has.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        T::KIND
    }
}

// Manual impls: `T` is only a marker and need not be `Clone`/`Copy`.
impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}

/// Whether a field accepts values pushed down from a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    /// Listed in the field registry; parents copy same-named changes in.
    Synced,
    /// Only written through the node itself.
    #[default]
    Private,
}

/// What a cloned node receives for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClonePolicy {
    /// The current value is duplicated.
    #[default]
    Copy,
    /// The clone starts from the descriptor default.
    Reset,
}

/// Schema entry for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: FieldName,
    kind: FieldKind,
    default: Value,
    exposure: Exposure,
    clone_policy: ClonePolicy,
}

impl FieldDescriptor {
    /// A private field whose kind is taken from `default`.
    #[must_use]
    pub fn new(name: impl Into<FieldName>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            kind: default.kind(),
            default,
            exposure: Exposure::Private,
            clone_policy: ClonePolicy::Copy,
        }
    }

    /// A private field of the given kind, defaulting to the kind's zero value.
    #[must_use]
    pub fn of_kind(name: impl Into<FieldName>, kind: FieldKind) -> Self {
        Self::new(name, kind.zero())
    }

    /// Descriptor for a typed key.
    #[must_use]
    pub fn typed<T: FieldType>(key: Field<T>, default: T) -> Self {
        Self::new(key.name(), default.into_value())
    }

    /// Builder: mark the field as part of the field registry.
    #[must_use]
    pub fn synced(mut self) -> Self {
        self.exposure = Exposure::Synced;
        self
    }

    /// Builder: set the exposure.
    #[must_use]
    pub fn with_exposure(mut self, exposure: Exposure) -> Self {
        self.exposure = exposure;
        self
    }

    /// Builder: set the clone policy.
    #[must_use]
    pub fn with_clone_policy(mut self, policy: ClonePolicy) -> Self {
        self.clone_policy = policy;
        self
    }

    #[must_use]
    pub fn name(&self) -> &FieldName {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    #[must_use]
    pub fn exposure(&self) -> Exposure {
        self.exposure
    }

    #[must_use]
    pub fn clone_policy(&self) -> ClonePolicy {
        self.clone_policy
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.exposure == Exposure::Synced
    }
}
