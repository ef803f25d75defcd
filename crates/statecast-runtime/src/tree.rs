#![forbid(unsafe_code)]

//! Arena-backed tree of state nodes.
//!
//! Nodes live in a slot arena and refer to each other by [`NodeId`]
//! (slot index + generation). Each slot records its parent and its ordered
//! children. The broadcast channel belongs to the root; since the root can
//! neither be detached nor moved, the tree stores it next to the root id.
//!
//! # Invariants
//!
//! 1. Exactly one root; every other live node has exactly one live parent.
//! 2. The parent/child relation is acyclic ([`StateTree::reparent`] refuses
//!    moves under a node's own subtree).
//! 3. `children` lists preserve insertion order.
//! 4. A freed slot bumps its generation, so ids of detached nodes never
//!    resolve again, even after the slot is reused.
//!
//! # Complexity
//!
//! | Operation | Time |
//! |-----------|------|
//! | insert | O(1) amortized |
//! | detach | O(size of subtree + siblings) |
//! | reparent | O(depth + siblings) |
//! | root_of | O(depth) |

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use statecast_core::StateError;

use crate::broadcast::{BroadcastChannel, BroadcastListener, ListenerId};
use crate::config::PropagationConfig;
use crate::error::{CallbackResult, TreeError, TreeResult};
use crate::evidence_sink::{EvidenceListener, EvidenceSink};
use crate::observer::Subscription;
use crate::state::{FieldChange, SubscribableState};

/// Generational index of a node in a [`StateTree`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Build an id from raw parts (diagnostics and tests).
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

pub(crate) struct Entry {
    pub(crate) state: SubscribableState,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// A tree of [`SubscribableState`] nodes with a single root.
pub struct StateTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    len: usize,
    /// The root's broadcast channel.
    pub(crate) channel: BroadcastChannel,
    config: PropagationConfig,
    /// Nesting level of propagation chains currently on the stack.
    pub(crate) depth: usize,
}

impl fmt::Debug for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTree")
            .field("root", &self.root)
            .field("len", &self.len)
            .field("free_slots", &self.free.len())
            .field("config", &self.config)
            .finish()
    }
}

impl StateTree {
    /// A tree containing only `root`, with the default configuration.
    #[must_use]
    pub fn new(root: SubscribableState) -> Self {
        Self::build(root, PropagationConfig::default())
    }

    /// A tree containing only `root`.
    ///
    /// When the configuration enables evidence logging, the sink is opened
    /// here and attached as the first root listener.
    pub fn with_config(root: SubscribableState, config: PropagationConfig) -> io::Result<Self> {
        let sink = EvidenceSink::from_config(&config.evidence)?;
        let mut tree = Self::build(root, config);
        if let Some(sink) = sink {
            tree.listen(EvidenceListener::new(sink));
        }
        Ok(tree)
    }

    fn build(root: SubscribableState, config: PropagationConfig) -> Self {
        let entry = Entry {
            state: root,
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                entry: Some(entry),
            }],
            free: Vec::new(),
            root: NodeId::from_raw(0, 0),
            len: 1,
            channel: BroadcastChannel::new(),
            config,
            depth: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_ok()
    }

    pub(crate) fn entry(&self, id: NodeId) -> TreeResult<&Entry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(TreeError::UnknownNode(id))
    }

    pub(crate) fn entry_mut(&mut self, id: NodeId) -> TreeResult<&mut Entry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(TreeError::UnknownNode(id))
    }

    pub fn node(&self, id: NodeId) -> TreeResult<&SubscribableState> {
        self.entry(id).map(|e| &e.state)
    }

    pub fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut SubscribableState> {
        self.entry_mut(id).map(|e| &mut e.state)
    }

    pub fn parent(&self, id: NodeId) -> TreeResult<Option<NodeId>> {
        self.entry(id).map(|e| e.parent)
    }

    /// Direct children in insertion order.
    pub fn children(&self, id: NodeId) -> TreeResult<&[NodeId]> {
        self.entry(id).map(|e| e.children.as_slice())
    }

    /// Walk parent links up to the root.
    pub fn root_of(&self, id: NodeId) -> TreeResult<NodeId> {
        let mut current = id;
        while let Some(parent) = self.entry(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Number of edges between `id` and the root.
    pub fn depth_of(&self, id: NodeId) -> TreeResult<usize> {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.entry(current)?.parent {
            current = parent;
            depth += 1;
        }
        Ok(depth)
    }

    /// Whether `ancestor` lies on the path from `id` to the root (inclusive).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> TreeResult<bool> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            current = self.entry(node)?.parent;
        }
        Ok(false)
    }

    /// All live node ids, depth-first pre-order from the root.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Ok(entry) = self.entry(id) {
                stack.extend(entry.children.iter().rev().copied());
            }
        }
        out
    }

    /// Insert `state` as the last child of `parent`.
    pub fn insert(&mut self, parent: NodeId, state: SubscribableState) -> TreeResult<NodeId> {
        self.entry(parent)?;
        let entry = Entry {
            state,
            parent: Some(parent),
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                NodeId::from_raw(index, slot.generation)
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| TreeError::ArenaFull)?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                NodeId::from_raw(index, 0)
            }
        };
        self.entry_mut(parent)?.children.push(id);
        self.len += 1;
        tracing::trace!(node = %id, parent = %parent, "node inserted");
        Ok(id)
    }

    /// Remove `id` and its whole subtree. Returns the detached node's state;
    /// descendants are dropped.
    pub fn detach(&mut self, id: NodeId) -> TreeResult<SubscribableState> {
        let parent = self.entry(id)?.parent.ok_or(TreeError::DetachRoot)?;
        self.entry_mut(parent)?.children.retain(|c| *c != id);

        let mut detached = None;
        let mut stack = vec![id];
        let mut removed = 0usize;
        while let Some(node) = stack.pop() {
            let slot = &mut self.slots[node.index as usize];
            let Some(entry) = slot.entry.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
            removed += 1;
            stack.extend(entry.children.iter().copied());
            if node == id {
                detached = Some(entry.state);
            }
        }
        self.len -= removed;
        tracing::debug!(node = %id, removed, "subtree detached");
        detached.ok_or(TreeError::UnknownNode(id))
    }

    /// Move `id` (with its subtree) to the end of `new_parent`'s children.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> TreeResult<()> {
        let old_parent = self.entry(id)?.parent.ok_or(TreeError::DetachRoot)?;
        self.entry(new_parent)?;
        if self.is_ancestor(id, new_parent)? {
            return Err(TreeError::WouldCycle { node: id, new_parent });
        }
        self.entry_mut(old_parent)?.children.retain(|c| *c != id);
        self.entry_mut(new_parent)?.children.push(id);
        self.entry_mut(id)?.parent = Some(new_parent);
        Ok(())
    }

    /// Register a handler on a node. See [`SubscribableState::add_handler`].
    pub fn add_handler(
        &mut self,
        id: NodeId,
        field: &str,
        handler: impl Fn(&mut StateTree, &FieldChange) -> CallbackResult + 'static,
    ) -> TreeResult<()> {
        self.node_mut(id)?
            .add_handler(field, handler)
            .map_err(|error| TreeError::State { node: id, error })
    }

    /// Observe committed changes on a node.
    pub fn subscribe(
        &mut self,
        id: NodeId,
        observer: impl Fn(&FieldChange) + 'static,
    ) -> TreeResult<Subscription> {
        Ok(self.node_mut(id)?.subscribe(observer))
    }

    /// Attach a listener to the root broadcast channel.
    pub fn listen(&mut self, listener: impl BroadcastListener + 'static) -> ListenerId {
        self.channel.attach(listener)
    }

    /// Detach a root listener. Returns whether it was attached.
    pub fn unlisten(&mut self, listener: ListenerId) -> bool {
        self.channel.detach(listener)
    }

    /// Number of listeners on the root channel.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.channel.len()
    }

    pub(crate) fn state_error(node: NodeId) -> impl FnOnce(StateError) -> TreeError {
        move |error| TreeError::State { node, error }
    }
}
