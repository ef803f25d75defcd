//! Property-based invariant tests for the propagation protocol.
//!
//! These properties must hold for any write sequence and tree shape:
//!
//! 1. Writing the current value again records nothing.
//! 2. Every node resolves to the root, and a write at any depth reaches the
//!    root listeners exactly once.
//! 3. Child sync never skips a level: after a root write only direct
//!    children hold the new value.
//! 4. While loading, only local notifications are recorded, and leaving
//!    loading replays nothing.
//! 5. The handler runs exactly once per changing write, whatever the fan-out.

use proptest::prelude::*;
use statecast_harness::{EventRecorder, Recorded, chain, fan};
use statecast_runtime::{Field, Value};

const VALUE: Field<i64> = Field::new("value");

proptest! {
    #[test]
    fn repeated_write_is_a_no_op(writes in prop::collection::vec(-5i64..5, 1..20)) {
        let (mut tree, ids) = chain(2).unwrap();
        let rec = EventRecorder::new();
        rec.observe_all(&mut tree).unwrap();
        rec.listen(&mut tree);
        let root = ids[0];

        for v in writes {
            tree.set(root, VALUE, v).unwrap();
            let before = rec.len();
            let report = tree.set(root, VALUE, v).unwrap();
            prop_assert!(!report.changed);
            prop_assert_eq!(rec.len(), before);
        }
    }

    #[test]
    fn any_depth_broadcasts_once_at_root(extra in 0usize..12, pick in any::<prop::sample::Index>(), v in 1i64..1000) {
        let (mut tree, ids) = chain(extra).unwrap();
        let rec = EventRecorder::new();
        rec.listen(&mut tree);
        let node = ids[pick.index(ids.len())];

        prop_assert_eq!(tree.root_of(node).unwrap(), tree.root());
        tree.set(node, VALUE, v).unwrap();
        prop_assert_eq!(
            rec.events(),
            vec![Recorded::Broadcast { origin: node, field: "value".into(), value: Value::Int(v) }]
        );
    }

    #[test]
    fn root_write_reaches_exactly_one_level(extra in 1usize..8, v in 1i64..1000) {
        let (mut tree, ids) = chain(extra).unwrap();
        let report = tree.set(ids[0], VALUE, v).unwrap();
        prop_assert_eq!(report.synced_children, vec![ids[1]]);
        for (level, id) in ids.iter().enumerate() {
            let expected = if level <= 1 { v } else { 0 };
            prop_assert_eq!(tree.get_as(*id, VALUE).unwrap(), expected);
        }
    }

    #[test]
    fn loading_records_only_local_notifications(writes in prop::collection::vec(1i64..50, 1..15)) {
        let (mut tree, children) = fan(3).unwrap();
        let root = tree.root();
        tree.set_loading(root, true).unwrap();
        let rec = EventRecorder::new();
        rec.observe_all(&mut tree).unwrap();
        rec.handle(&mut tree, root, "value").unwrap();
        rec.listen(&mut tree);

        let mut changes = 0;
        let mut current = 0;
        for v in writes {
            if v != current {
                changes += 1;
                current = v;
            }
            tree.set(root, VALUE, v).unwrap();
        }
        prop_assert_eq!(rec.notifications(), changes);
        prop_assert_eq!(rec.handler_calls(), 0);
        prop_assert_eq!(rec.broadcasts(), 0);

        rec.clear();
        tree.set_loading(root, false).unwrap();
        prop_assert_eq!(rec.handler_calls(), 0);
        prop_assert_eq!(rec.count(|e| e.field() == "value"), 0);
        for child in children {
            prop_assert_eq!(tree.get_as(child, VALUE).unwrap(), 0);
        }
    }

    #[test]
    fn handler_once_per_changing_write(width in 0usize..10, v in 1i64..1000) {
        let (mut tree, children) = fan(width).unwrap();
        let root = tree.root();
        let rec = EventRecorder::new();
        rec.handle(&mut tree, root, "value").unwrap();

        let report = tree.set(root, VALUE, v).unwrap();
        prop_assert_eq!(rec.handler_calls(), 1);
        prop_assert_eq!(report.synced_children, children);
    }
}
