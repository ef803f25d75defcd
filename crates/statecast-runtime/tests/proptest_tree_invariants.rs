//! Property-based structural invariants of the state tree.
//!
//! After any sequence of inserts, detaches and reparents:
//!
//! 1. `len()` equals the number of nodes reachable from the root.
//! 2. Every live non-root node is listed among its parent's children, once.
//! 3. Every live node resolves to the root (no cycles, no orphans).
//! 4. Detached ids never resolve again, even after their slot is reused.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use statecast_runtime::{NodeId, NodeSchema, StateTree, SubscribableState, TreeError};

#[derive(Debug, Clone)]
enum Op {
    Insert { parent: prop::sample::Index },
    Detach { node: prop::sample::Index },
    Reparent {
        node: prop::sample::Index,
        parent: prop::sample::Index,
    },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<prop::sample::Index>().prop_map(|parent| Op::Insert { parent }),
        1 => any::<prop::sample::Index>().prop_map(|node| Op::Detach { node }),
        1 => (any::<prop::sample::Index>(), any::<prop::sample::Index>())
            .prop_map(|(node, parent)| Op::Reparent { node, parent }),
    ]
}

fn state(schema: &Arc<NodeSchema>) -> SubscribableState {
    SubscribableState::new(Arc::clone(schema))
}

proptest! {
    #[test]
    fn structure_survives_random_edits(ops in prop::collection::vec(op(), 1..60)) {
        let schema = NodeSchema::builder("Node").synced("v", 0).build_shared().unwrap();
        let mut tree = StateTree::new(state(&schema));
        let mut dead: Vec<NodeId> = Vec::new();

        for op in ops {
            let live = tree.node_ids();
            match op {
                Op::Insert { parent } => {
                    let parent = live[parent.index(live.len())];
                    tree.insert(parent, state(&schema)).unwrap();
                }
                Op::Detach { node } => {
                    let node = live[node.index(live.len())];
                    if node == tree.root() {
                        prop_assert_eq!(tree.detach(node).unwrap_err(), TreeError::DetachRoot);
                    } else {
                        let doomed: Vec<_> = live
                            .iter()
                            .copied()
                            .filter(|id| tree.is_ancestor(node, *id).unwrap())
                            .collect();
                        tree.detach(node).unwrap();
                        dead.extend(doomed);
                    }
                }
                Op::Reparent { node, parent } => {
                    let node = live[node.index(live.len())];
                    let parent = live[parent.index(live.len())];
                    let result = tree.reparent(node, parent);
                    if node == tree.root() {
                        prop_assert_eq!(result, Err(TreeError::DetachRoot));
                    } else if tree.is_ancestor(node, parent).unwrap() {
                        prop_assert_eq!(result, Err(TreeError::WouldCycle { node, new_parent: parent }));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                    }
                }
            }

            let live = tree.node_ids();
            prop_assert_eq!(live.len(), tree.len());
            let unique: HashSet<_> = live.iter().copied().collect();
            prop_assert_eq!(unique.len(), live.len());
            for id in &live {
                prop_assert_eq!(tree.root_of(*id).unwrap(), tree.root());
                if let Some(parent) = tree.parent(*id).unwrap() {
                    let listed = tree.children(parent).unwrap().iter().filter(|c| *c == id).count();
                    prop_assert_eq!(listed, 1);
                }
            }
            for id in &dead {
                prop_assert!(!tree.contains(*id));
            }
        }
    }
}
