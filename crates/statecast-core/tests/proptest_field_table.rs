//! Property-based invariant tests for values and field tables.
//!
//! 1. Value equality is reflexive for every value, NaN included.
//! 2. `write` reports a change exactly when the stored value differs, and
//!    the returned previous value is what was stored before.
//! 3. Stored kinds never change: wrong-kind writes are rejected and leave
//!    the table untouched.
//! 4. `receive` assigns registry fields only.

use std::sync::Arc;

use proptest::prelude::*;
use statecast_core::{FieldKind, FieldTable, NodeSchema, StateError, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        "[a-z]{0,6}".prop_map(Value::Text),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(2, 8, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::List)
    })
}

fn schema() -> Arc<NodeSchema> {
    NodeSchema::builder("Props")
        .synced("flag", false)
        .synced("count", 0)
        .private("ratio", 0.0)
        .private("label", "")
        .build_shared()
        .unwrap()
}

fn field_for(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Bool => "flag",
        FieldKind::Int => "count",
        FieldKind::Float => "ratio",
        FieldKind::Text => "label",
        FieldKind::List => "missing",
    }
}

proptest! {
    #[test]
    fn equality_is_reflexive(v in value()) {
        prop_assert_eq!(&v, &v.clone());
    }

    #[test]
    fn write_reports_change_iff_different(writes in prop::collection::vec(scalar(), 1..30)) {
        let mut table = FieldTable::new(schema());
        for v in writes {
            let name = field_for(v.kind());
            let before = table.get(name).unwrap().clone();
            let result = table.write(name, v.clone()).unwrap();
            if before == v {
                prop_assert_eq!(result, None);
            } else {
                prop_assert_eq!(result, Some(before));
            }
            prop_assert_eq!(table.get(name).unwrap(), &v);
        }
    }

    #[test]
    fn wrong_kind_is_rejected_without_effect(v in scalar()) {
        let mut table = FieldTable::new(schema());
        let target = if v.kind() == FieldKind::Int { "flag" } else { "count" };
        let before = table.get(target).unwrap().clone();
        let err = table.write(target, v).unwrap_err();
        let is_mismatch = matches!(err, StateError::TypeMismatch { .. });
        prop_assert!(is_mismatch);
        prop_assert_eq!(table.get(target).unwrap(), &before);
    }

    #[test]
    fn receive_assigns_registry_fields_only(v in scalar()) {
        let mut table = FieldTable::new(schema());
        let name = field_for(v.kind());
        let synced = table.registry().contains(name);
        let accepted = table.receive(name, v.clone()).unwrap();
        prop_assert_eq!(accepted, synced);
        if synced {
            prop_assert_eq!(table.get(name).unwrap(), &v);
        } else {
            prop_assert_eq!(table.get(name).unwrap(), &v.kind().zero());
        }
    }
}
