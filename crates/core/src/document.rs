//! The document-tree collaborator.
//!
//! The canvas being edited is owned by someone else (the editor front end, or
//! an in-process sandbox). The batch-edit interpreter and the inspection
//! tools only ever talk to it through [`DocumentTree`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::CanvasError;
use crate::image::ImageFill;
use crate::query::{
    BatchGetQuery, EmptySpaceQuery, LayoutQuery, PropertyName, PropertyReplacements,
};

/// Node properties, keyed by property name.
pub type Props = Map<String, Value>;

/// A document shared between concurrently executing tool calls. Holding the
/// lock for a whole script makes that script atomic relative to other reads.
pub type SharedDocument = Arc<Mutex<dyn DocumentTree>>;

/// Wrap a concrete document for sharing.
pub fn shared<D: DocumentTree + 'static>(doc: D) -> SharedDocument {
    Arc::new(Mutex::new(doc))
}

/// The closed set of node type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Frame,
    Group,
    Rectangle,
    Ellipse,
    Line,
    Polygon,
    Path,
    Text,
    Connection,
    Note,
    IconFont,
    Image,
    Ref,
}

impl NodeType {
    pub const ALL: [NodeType; 13] = [
        NodeType::Frame,
        NodeType::Group,
        NodeType::Rectangle,
        NodeType::Ellipse,
        NodeType::Line,
        NodeType::Polygon,
        NodeType::Path,
        NodeType::Text,
        NodeType::Connection,
        NodeType::Note,
        NodeType::IconFont,
        NodeType::Image,
        NodeType::Ref,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Frame => "frame",
            NodeType::Group => "group",
            NodeType::Rectangle => "rectangle",
            NodeType::Ellipse => "ellipse",
            NodeType::Line => "line",
            NodeType::Polygon => "polygon",
            NodeType::Path => "path",
            NodeType::Text => "text",
            NodeType::Connection => "connection",
            NodeType::Note => "note",
            NodeType::IconFont => "icon_font",
            NodeType::Image => "image",
            NodeType::Ref => "ref",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether an image fill may be applied to nodes of this type.
    pub fn can_carry_fill(&self) -> bool {
        matches!(self, NodeType::Frame | NodeType::Rectangle)
    }

    /// Whether nodes of this type hold an ordered child list.
    pub fn has_children(&self) -> bool {
        matches!(self, NodeType::Frame | NodeType::Group)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a resolved path expression points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// A real node in the document.
    Node { id: String },
    /// A node inside the component referenced by `instance`, addressed by
    /// the component-side id path. Edits land in the instance's overrides.
    InstanceDescendant { instance: String, path: Vec<String> },
}

impl Target {
    pub fn node(id: impl Into<String>) -> Self {
        Target::Node { id: id.into() }
    }

    /// The override key for an instance descendant, or the node id.
    pub fn key(&self) -> String {
        match self {
            Target::Node { id } => id.clone(),
            Target::InstanceDescendant { instance, path } => {
                format!("{instance}/{}", path.join("/"))
            }
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Where to place a copied node relative to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub direction: Direction,
    pub padding: f64,
}

/// Options for duplicating a subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyOptions {
    /// Properties patched onto the copy's root.
    pub overrides: Props,
    /// Patches keyed by a path relative to the copy's root.
    pub descendants: Props,
    pub placement: Option<Placement>,
}

/// The operations the gateway needs from a document.
///
/// Mutations take `&mut self`; callers serialize access through
/// [`SharedDocument`]. Every mutation either fully applies or returns an
/// error without touching the tree.
pub trait DocumentTree: Send {
    /// Id of the root node (the `document` binding).
    fn root_id(&self) -> &str;

    /// Resolve a path expression (`id` or `id/segment/...`) to one target.
    fn resolve(&self, path: &str) -> Result<Target, CanvasError>;

    /// Type of the node a target points at.
    fn node_type(&self, target: &Target) -> Result<NodeType, CanvasError>;

    /// Create a node (and any nested `children`) under `parent`.
    fn insert(&mut self, parent: &Target, payload: Props) -> Result<String, CanvasError>;

    /// Duplicate `source` under `parent`.
    fn copy(
        &mut self,
        source: &Target,
        parent: &Target,
        options: CopyOptions,
    ) -> Result<String, CanvasError>;

    /// Shallow-patch properties. `null` values remove the property.
    fn update(&mut self, target: &Target, patch: Props) -> Result<(), CanvasError>;

    /// Swap the node at `target` for a new one at the same sibling position.
    fn replace(&mut self, target: &Target, payload: Props) -> Result<String, CanvasError>;

    /// Reparent and/or reorder a node. `None` leaves that dimension as is.
    fn move_node(
        &mut self,
        node: &Target,
        parent: Option<&Target>,
        index: Option<usize>,
    ) -> Result<(), CanvasError>;

    /// Remove a node and its subtree.
    fn delete(&mut self, target: &Target) -> Result<(), CanvasError>;

    fn apply_fill(&mut self, target: &Target, fill: &ImageFill) -> Result<(), CanvasError>;

    // --- read-only queries and bulk edits used by inspection tools ---

    fn editor_state(&self, include_schema: bool) -> Value;

    fn open_document(&mut self, path_or_template: &str) -> Result<Value, CanvasError>;

    fn batch_get(&self, query: &BatchGetQuery) -> Result<Value, CanvasError>;

    fn snapshot_layout(&self, query: &LayoutQuery) -> Result<Value, CanvasError>;

    fn variables(&self) -> Value;

    fn set_variables(&mut self, variables: Props, replace: bool) -> Value;

    fn find_empty_space(&self, query: &EmptySpaceQuery) -> Result<Value, CanvasError>;

    fn search_unique_properties(
        &self,
        parents: &[String],
        properties: &[PropertyName],
    ) -> Result<Value, CanvasError>;

    fn replace_matching_properties(
        &mut self,
        parents: &[String],
        replacements: &PropertyReplacements,
    ) -> Result<Value, CanvasError>;
}
