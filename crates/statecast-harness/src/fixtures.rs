#![forbid(unsafe_code)]

//! Canonical schemas and trees shared by the integration tests.
//!
//! The document fixture has four levels:
//!
//! ```text
//! Document (theme, zoom | title)
//! ├── Section[0] (theme, zoom | collapsed)
//! │   ├── Paragraph[0] (theme | zoom, text)
//! │   │   └── Span (theme, zoom)
//! │   └── Paragraph[1]
//! └── Section[1]
//! ```
//!
//! Fields left of `|` are synced, the rest private. Paragraphs keep `zoom`
//! private, so a section's zoom change stops above the paragraph level.

use std::error::Error;
use std::sync::Arc;

use statecast_core::{Field, NodeSchema};
use statecast_runtime::{NodeId, StateTree, SubscribableState, TreeResult};

pub const THEME: Field<String> = Field::new("theme");
pub const ZOOM: Field<i64> = Field::new("zoom");
pub const TITLE: Field<String> = Field::new("title");
pub const COLLAPSED: Field<bool> = Field::new("collapsed");
pub const TEXT: Field<String> = Field::new("text");

pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_ZOOM: i64 = 100;

pub type FixtureResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Clone)]
pub struct Schemas {
    pub document: Arc<NodeSchema>,
    pub section: Arc<NodeSchema>,
    pub paragraph: Arc<NodeSchema>,
    pub span: Arc<NodeSchema>,
}

impl Schemas {
    pub fn build() -> FixtureResult<Self> {
        Ok(Self {
            document: NodeSchema::builder("Document")
                .synced("theme", DEFAULT_THEME)
                .synced("zoom", DEFAULT_ZOOM)
                .private("title", "untitled")
                .build_shared()?,
            section: NodeSchema::builder("Section")
                .synced("theme", DEFAULT_THEME)
                .synced("zoom", DEFAULT_ZOOM)
                .private("collapsed", false)
                .build_shared()?,
            paragraph: NodeSchema::builder("Paragraph")
                .synced("theme", DEFAULT_THEME)
                .private("zoom", DEFAULT_ZOOM)
                .private("text", "")
                .build_shared()?,
            span: NodeSchema::builder("Span")
                .synced("theme", DEFAULT_THEME)
                .synced("zoom", DEFAULT_ZOOM)
                .build_shared()?,
        })
    }
}

/// The four-level document tree.
#[derive(Debug)]
pub struct DocumentFixture {
    pub tree: StateTree,
    pub schemas: Schemas,
    pub document: NodeId,
    pub sections: [NodeId; 2],
    pub paragraphs: [NodeId; 2],
    /// Depth 3, under `paragraphs[0]`.
    pub span: NodeId,
}

impl DocumentFixture {
    pub fn build() -> FixtureResult<Self> {
        let schemas = Schemas::build()?;
        let mut tree = StateTree::new(SubscribableState::new(Arc::clone(&schemas.document)));
        let document = tree.root();
        let s0 = tree.insert(document, SubscribableState::new(Arc::clone(&schemas.section)))?;
        let s1 = tree.insert(document, SubscribableState::new(Arc::clone(&schemas.section)))?;
        let p0 = tree.insert(s0, SubscribableState::new(Arc::clone(&schemas.paragraph)))?;
        let p1 = tree.insert(s0, SubscribableState::new(Arc::clone(&schemas.paragraph)))?;
        let span = tree.insert(p0, SubscribableState::new(Arc::clone(&schemas.span)))?;
        Ok(Self {
            tree,
            schemas,
            document,
            sections: [s0, s1],
            paragraphs: [p0, p1],
            span,
        })
    }

    /// Every node id, pre-order.
    #[must_use]
    pub fn all(&self) -> Vec<NodeId> {
        self.tree.node_ids()
    }
}

/// A linear chain of `extra` nodes below a root, all exposing `value: Int`.
/// Returns the tree and the ids from the root down.
pub fn chain(extra: usize) -> FixtureResult<(StateTree, Vec<NodeId>)> {
    let schema = NodeSchema::builder("Link").synced("value", 0).build_shared()?;
    let mut tree = StateTree::new(SubscribableState::new(Arc::clone(&schema)));
    let mut ids = vec![tree.root()];
    for _ in 0..extra {
        let parent = ids[ids.len() - 1];
        ids.push(tree.insert(parent, SubscribableState::new(Arc::clone(&schema)))?);
    }
    Ok((tree, ids))
}

/// A root with `width` direct children, all exposing `value: Int`.
pub fn fan(width: usize) -> FixtureResult<(StateTree, Vec<NodeId>)> {
    let schema = NodeSchema::builder("Leaf").synced("value", 0).build_shared()?;
    let mut tree = StateTree::new(SubscribableState::new(Arc::clone(&schema)));
    let root = tree.root();
    let children = (0..width)
        .map(|_| tree.insert(root, SubscribableState::new(Arc::clone(&schema))))
        .collect::<TreeResult<Vec<_>>>()?;
    Ok((tree, children))
}
