#![forbid(unsafe_code)]

//! Field storage for a single node, and the field registry view over it.
//!
//! # Invariants
//!
//! 1. `values[i]` always holds a value of the kind declared by descriptor `i`.
//! 2. [`FieldTable::write`] reports a change only when the stored value
//!    actually differs; equal writes leave the table untouched.
//! 3. [`FieldTable::receive`] only assigns fields listed in the registry.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown name | Field not declared in the schema | `StateError::UnknownField` |
//! | Kind mismatch | Value kind differs from the descriptor | `StateError::TypeMismatch` |
//! | Push to private field | Name declared but not synced | `receive` returns `Ok(false)` |

use std::sync::Arc;

use crate::error::{StateError, StateResult};
use crate::field::{ClonePolicy, Field, FieldDescriptor, FieldName, LOADING_FIELD};
use crate::schema::NodeSchema;
use crate::value::{FieldType, Value};

/// Schema plus index-aligned values.
#[derive(Debug, PartialEq)]
pub struct FieldTable {
    schema: Arc<NodeSchema>,
    values: Vec<Value>,
}

impl FieldTable {
    /// A table holding every field's default value.
    #[must_use]
    pub fn new(schema: Arc<NodeSchema>) -> Self {
        let values = schema
            .descriptors()
            .map(|d| d.default_value().clone())
            .collect();
        Self { schema, values }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<NodeSchema> {
        &self.schema
    }

    fn slot(&self, name: &str, value: &Value) -> StateResult<usize> {
        let (index, descriptor) = self
            .schema
            .lookup(name)
            .ok_or_else(|| StateError::UnknownField(name.into()))?;
        if descriptor.kind() != value.kind() {
            return Err(StateError::TypeMismatch {
                field: descriptor.name().clone(),
                expected: descriptor.kind(),
                found: value.kind(),
            });
        }
        Ok(index)
    }

    /// Validate a write of `value` to `name` without performing it.
    pub fn check(&self, name: &str, value: &Value) -> StateResult<()> {
        self.slot(name, value).map(|_| ())
    }

    /// Current value of a field.
    pub fn get(&self, name: &str) -> StateResult<&Value> {
        self.schema
            .index_of(name)
            .map(|i| &self.values[i])
            .ok_or_else(|| StateError::UnknownField(name.into()))
    }

    /// Current value of a field read through a typed key.
    pub fn get_typed<T: FieldType>(&self, key: Field<T>) -> StateResult<T> {
        let value = self.get(key.name())?;
        T::from_value(value).ok_or_else(|| StateError::TypeMismatch {
            field: key.name().into(),
            expected: value.kind(),
            found: T::KIND,
        })
    }

    /// Assign without change detection. Used while building a node.
    pub fn assign(&mut self, name: &str, value: Value) -> StateResult<()> {
        let index = self.slot(name, &value)?;
        self.values[index] = value;
        Ok(())
    }

    /// Write with change detection.
    ///
    /// Returns `Ok(Some(previous))` when the stored value changed and
    /// `Ok(None)` when `value` equals the current value.
    pub fn write(&mut self, name: &str, value: Value) -> StateResult<Option<Value>> {
        let index = self.slot(name, &value)?;
        if self.values[index] == value {
            return Ok(None);
        }
        Ok(Some(std::mem::replace(&mut self.values[index], value)))
    }

    /// Accept a value pushed from a parent.
    ///
    /// Returns `Ok(false)` when `name` is not in the field registry (undeclared
    /// or private). A registry field of a different kind is an error.
    pub fn receive(&mut self, name: &str, value: Value) -> StateResult<bool> {
        if !self.registry().contains(name) {
            return Ok(false);
        }
        let index = self.slot(name, &value)?;
        self.values[index] = value;
        Ok(true)
    }

    /// The field registry: names this table accepts pushes for.
    #[must_use]
    pub fn registry(&self) -> FieldRegistry<'_> {
        FieldRegistry {
            schema: &*self.schema,
        }
    }

    /// Current loading flag.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        // Index 0 is the built-in flag; see `NodeSchema` invariants.
        matches!(self.values.first(), Some(Value::Bool(true)))
    }

    /// Descriptor/value pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.schema.descriptors().zip(self.values.iter())
    }

    /// Duplicate the table, applying each descriptor's [`ClonePolicy`].
    #[must_use]
    pub fn clone_with_policy(&self) -> Self {
        let values = self
            .iter()
            .map(|(d, v)| match d.clone_policy() {
                ClonePolicy::Copy => v.clone(),
                ClonePolicy::Reset => d.default_value().clone(),
            })
            .collect();
        Self {
            schema: Arc::clone(&self.schema),
            values,
        }
    }
}

/// Read-only view of the fields a node accepts pushed updates for.
#[derive(Debug, Clone, Copy)]
pub struct FieldRegistry<'a> {
    schema: &'a NodeSchema,
}

impl<'a> FieldRegistry<'a> {
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schema.get(name).is_some_and(FieldDescriptor::is_synced)
    }

    /// Registry names in declaration order.
    pub fn names(self) -> impl Iterator<Item = &'a FieldName> + 'a {
        self.schema
            .descriptors()
            .filter(|d| d.is_synced())
            .map(FieldDescriptor::name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names().next().is_none()
    }

    /// Whether the built-in loading flag is pushed into this node.
    #[must_use]
    pub fn includes_loading(&self) -> bool {
        self.contains(LOADING_FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldKind;

    const COUNT: Field<i64> = Field::new("count");

    fn table() -> FieldTable {
        let schema = NodeSchema::builder("Counter")
            .synced("count", 0)
            .private("label", "idle")
            .field(FieldDescriptor::new("scratch", 1.0).with_clone_policy(ClonePolicy::Reset))
            .build_shared()
            .unwrap();
        FieldTable::new(schema)
    }

    #[test]
    fn starts_with_defaults() {
        let t = table();
        assert_eq!(t.get("count").unwrap(), &Value::Int(0));
        assert_eq!(t.get("label").unwrap(), &Value::from("idle"));
        assert!(!t.is_loading());
    }

    #[test]
    fn write_reports_previous_only_on_change() {
        let mut t = table();
        assert_eq!(t.write("count", Value::Int(5)).unwrap(), Some(Value::Int(0)));
        assert_eq!(t.write("count", Value::Int(5)).unwrap(), None);
        assert_eq!(t.get_typed(COUNT).unwrap(), 5);
    }

    #[test]
    fn unknown_field_is_an_error() {
        let mut t = table();
        assert_eq!(
            t.write("nope", Value::Int(1)),
            Err(StateError::UnknownField("nope".into()))
        );
        assert!(t.get("nope").is_err());
    }

    #[test]
    fn kind_mismatch_is_rejected_and_value_kept() {
        let mut t = table();
        let err = t.write("count", Value::from("five")).unwrap_err();
        assert_eq!(
            err,
            StateError::TypeMismatch {
                field: "count".into(),
                expected: FieldKind::Int,
                found: FieldKind::Text,
            }
        );
        assert_eq!(t.get("count").unwrap(), &Value::Int(0));
    }

    #[test]
    fn receive_only_touches_registry_fields() {
        let mut t = table();
        assert!(t.receive("count", Value::Int(9)).unwrap());
        assert!(!t.receive("label", Value::from("busy")).unwrap());
        assert!(!t.receive("missing", Value::Int(1)).unwrap());
        assert_eq!(t.get("count").unwrap(), &Value::Int(9));
        assert_eq!(t.get("label").unwrap(), &Value::from("idle"));
    }

    #[test]
    fn check_validates_without_writing() {
        let t = table();
        assert_eq!(t.check("count", &Value::Int(3)), Ok(()));
        assert!(matches!(
            t.check("count", &Value::from("three")),
            Err(StateError::TypeMismatch { .. })
        ));
        assert_eq!(
            t.check("nope", &Value::Int(1)),
            Err(StateError::UnknownField("nope".into()))
        );
        assert_eq!(t.get("count").unwrap(), &Value::Int(0));
    }

    #[test]
    fn receive_with_wrong_kind_fails() {
        let mut t = table();
        assert!(t.receive("count", Value::Bool(true)).is_err());
    }

    #[test]
    fn registry_lists_synced_names_in_order() {
        let t = table();
        let reg = t.registry();
        assert!(reg.contains("count"));
        assert!(!reg.contains("label"));
        assert!(!reg.includes_loading());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.names().next().unwrap(), "count");
    }

    #[test]
    fn loading_flag_reads_from_first_slot() {
        let mut t = table();
        t.write(LOADING_FIELD, Value::Bool(true)).unwrap();
        assert!(t.is_loading());
    }

    #[test]
    fn clone_policy_resets_marked_fields() {
        let mut t = table();
        t.write("count", Value::Int(3)).unwrap();
        t.write("scratch", Value::Float(9.5)).unwrap();
        let c = t.clone_with_policy();
        assert_eq!(c.get("count").unwrap(), &Value::Int(3));
        assert_eq!(c.get("scratch").unwrap(), &Value::Float(1.0));
    }
}
