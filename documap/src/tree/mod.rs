//! In-memory document tree.
//!
//! A [`DocumentTree`] owns every node of one root document and its embedded
//! children in an arena. Nodes reference their parent through a [`NodeId`]
//! index rather than an owning pointer, so the parent/child cycle of an
//! object graph never turns into shared ownership: the arena owns, handles
//! point.

use crate::common::{Document, Value, DOC_ID};
use crate::errors::{DocumapError, DocumapResult, ErrorKind};

/// How a node is stored relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A top-level document with its own collection entry.
    Root,
    /// A singular embedded document stored under a field of its parent.
    EmbedsOne,
    /// An element of an ordered embedded collection field.
    EmbedsMany,
}

/// Handle to a node inside a [`DocumentTree`].
///
/// Handles are plain indices and are only meaningful for the tree that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct TreeNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    field: Option<String>,
    ordinal: Option<usize>,
    new_record: bool,
    removed: bool,
    attributes: Document,
    // fields changed since hydration, in change order
    dirty: Document,
}

/// Arena of one root document and its embedded descendants.
///
/// Invariants enforced by construction: the root carries neither parent nor
/// storage field; every non-root node carries both. Embeds-many ordinals are
/// assigned when a node is persisted, never before.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<TreeNode>,
}

impl DocumentTree {
    /// Creates a tree whose root was hydrated from the datastore.
    pub fn hydrated(attributes: Document) -> Self {
        Self::with_root(attributes, false)
    }

    /// Creates a tree whose root has never been persisted.
    pub fn new_record(attributes: Document) -> Self {
        Self::with_root(attributes, true)
    }

    fn with_root(attributes: Document, new_record: bool) -> Self {
        DocumentTree {
            nodes: vec![TreeNode {
                kind: NodeKind::Root,
                parent: None,
                field: None,
                ordinal: None,
                new_record,
                removed: false,
                attributes,
                dirty: Document::new(),
            }],
        }
    }

    /// Returns the root node handle.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Adds a new (unpersisted) embeds-one child under `field` of `parent`.
    pub fn add_embeds_one(
        &mut self,
        parent: NodeId,
        field: &str,
        attributes: Document,
    ) -> DocumapResult<NodeId> {
        self.add_child(parent, field, attributes, NodeKind::EmbedsOne, None, true)
    }

    /// Adds a new (unpersisted) embeds-many child under `field` of `parent`.
    /// The node has no ordinal until it is persisted.
    pub fn add_embeds_many(
        &mut self,
        parent: NodeId,
        field: &str,
        attributes: Document,
    ) -> DocumapResult<NodeId> {
        self.add_child(parent, field, attributes, NodeKind::EmbedsMany, None, true)
    }

    /// Attaches an embeds-one child hydrated from stored attributes.
    pub fn hydrated_embeds_one(
        &mut self,
        parent: NodeId,
        field: &str,
        attributes: Document,
    ) -> DocumapResult<NodeId> {
        self.add_child(parent, field, attributes, NodeKind::EmbedsOne, None, false)
    }

    /// Attaches an embeds-many child hydrated from stored attributes at the
    /// given array ordinal.
    pub fn hydrated_embeds_many(
        &mut self,
        parent: NodeId,
        field: &str,
        ordinal: usize,
        attributes: Document,
    ) -> DocumapResult<NodeId> {
        self.add_child(
            parent,
            field,
            attributes,
            NodeKind::EmbedsMany,
            Some(ordinal),
            false,
        )
    }

    fn add_child(
        &mut self,
        parent: NodeId,
        field: &str,
        attributes: Document,
        kind: NodeKind,
        ordinal: Option<usize>,
        new_record: bool,
    ) -> DocumapResult<NodeId> {
        if field.is_empty() {
            log::error!("Embedded node requires a storage field name");
            return Err(DocumapError::new(
                "Embedded node requires a storage field name",
                ErrorKind::InvalidOperation,
            ));
        }
        self.check(parent)?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            kind,
            parent: Some(parent),
            field: Some(field.to_string()),
            ordinal,
            new_record,
            removed: false,
            attributes,
            dirty: Document::new(),
        });
        Ok(id)
    }

    /// Marks a node as persisted. For embeds-many nodes the ordinal is the
    /// array slot the driver assigned.
    pub fn mark_persisted(&mut self, node: NodeId, ordinal: Option<usize>) -> DocumapResult<()> {
        self.check(node)?;
        let record = &mut self.nodes[node.0];
        record.new_record = false;
        if record.kind == NodeKind::EmbedsMany {
            record.ordinal = ordinal;
        }
        record.dirty = Document::new();
        Ok(())
    }

    /// Marks an embedded node as removed so the next save emits the matching
    /// delete modifier. Removing the root is not a tree operation.
    pub fn remove_node(&mut self, node: NodeId) -> DocumapResult<()> {
        self.check(node)?;
        if self.nodes[node.0].kind == NodeKind::Root {
            log::error!("Cannot remove the root node from its own tree");
            return Err(DocumapError::new(
                "Cannot remove the root node from its own tree",
                ErrorKind::InvalidOperation,
            ));
        }
        self.nodes[node.0].removed = true;
        Ok(())
    }

    /// Writes an attribute and records it as dirty for the next save.
    pub fn set_attribute<T: Into<Value>>(
        &mut self,
        node: NodeId,
        key: &str,
        value: T,
    ) -> DocumapResult<()> {
        self.check(node)?;
        let value = value.into();
        let record = &mut self.nodes[node.0];
        record.attributes.put(key, value.clone())?;
        record.dirty.put(key, value)?;
        Ok(())
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.0].kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn field(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].field.as_deref()
    }

    pub fn ordinal(&self, node: NodeId) -> Option<usize> {
        self.nodes[node.0].ordinal
    }

    /// Whether the node has never been persisted. Read live at every call
    /// since persistence transitions nodes out of this state.
    pub fn is_new(&self, node: NodeId) -> bool {
        self.nodes[node.0].new_record
    }

    pub fn is_removed(&self, node: NodeId) -> bool {
        self.nodes[node.0].removed
    }

    pub fn attributes(&self, node: NodeId) -> &Document {
        &self.nodes[node.0].attributes
    }

    /// Fields changed since hydration or the last successful save.
    pub fn dirty(&self, node: NodeId) -> &Document {
        &self.nodes[node.0].dirty
    }

    /// The node's identity (`_id` attribute), if assigned.
    pub fn id(&self, node: NodeId) -> Option<&Value> {
        self.nodes[node.0].attributes.get(DOC_ID)
    }

    /// All node handles in insertion order, root first.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check(&self, node: NodeId) -> DocumapResult<()> {
        if node.0 >= self.nodes.len() {
            log::error!("Node handle {:?} does not belong to this tree", node);
            return Err(DocumapError::new(
                &format!("Node handle {:?} does not belong to this tree", node),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
