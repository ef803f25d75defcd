#![forbid(unsafe_code)]

//! Serializable point-in-time view of a tree.
//!
//! Snapshots carry structure and field values only. Callbacks (handlers,
//! commands, observers, listeners) are listed by name or count, never
//! serialized.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use statecast_core::{FieldName, Value};

use crate::tree::{NodeId, StateTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub type_name: String,
    /// Field values in schema order, including the loading flag.
    pub fields: IndexMap<FieldName, Value>,
    /// Fields with a registered handler, sorted.
    pub handlers: Vec<String>,
    pub commands: Vec<String>,
    pub children: Vec<NodeId>,
}

impl NodeSnapshot {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            self.fields.get(statecast_core::LOADING_FIELD),
            Some(Value::Bool(true))
        )
    }
}

/// Every live node, depth-first pre-order from the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub root: NodeId,
    pub listeners: usize,
    pub nodes: Vec<NodeSnapshot>,
}

impl TreeSnapshot {
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl StateTree {
    /// Capture the current structure and field values.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let nodes = self
            .node_ids()
            .into_iter()
            .filter_map(|id| {
                let entry = self.entry(id).ok()?;
                let state = &entry.state;
                let mut handlers: Vec<String> = state
                    .fields()
                    .iter()
                    .map(|(d, _)| d.name())
                    .filter(|name| state.has_handler(name.as_str()))
                    .map(|name| name.as_str().to_owned())
                    .collect();
                handlers.sort_unstable();
                Some(NodeSnapshot {
                    id,
                    parent: entry.parent,
                    type_name: state.type_name().to_owned(),
                    fields: state
                        .fields()
                        .iter()
                        .map(|(d, v)| (d.name().clone(), v.clone()))
                        .collect(),
                    handlers,
                    commands: state.commands().names().map(str::to_owned).collect(),
                    children: entry.children.clone(),
                })
            })
            .collect();

        TreeSnapshot {
            root: self.root(),
            listeners: self.listener_count(),
            nodes,
        }
    }
}
