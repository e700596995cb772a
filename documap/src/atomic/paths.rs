//! Positional path resolution for atomic modifier operations.
//!
//! Every node of a [`DocumentTree`] maps to a dotted position inside the
//! root's stored representation. `position` addresses the node itself (the
//! `$set`/`$push` target), `path` addresses the container field holding it
//! (the `$unset`/`$pull` target). The two differ only for embeds-many
//! elements, where `path` drops the trailing array ordinal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::{FIELD_SEPARATOR, OP_PULL, OP_PUSH, OP_SET, OP_UNSET};
use crate::errors::{DocumapError, DocumapResult, ErrorKind};
use crate::tree::{DocumentTree, NodeId, NodeKind};

// Matches only a trailing dot-plus-digits group, so field names containing
// digits elsewhere are never corrupted.
static TRAILING_ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.\d+$").expect("trailing ordinal pattern is valid")
});

/// Computes the position string addressing `node` for `$set`/`$push` style
/// operations.
///
/// - Root nodes have the empty position.
/// - Embeds-one nodes append their storage field to the parent position.
/// - Embeds-many nodes additionally append `.<ordinal>`, but only when the
///   node is already persisted; a new node's eventual array slot is not yet
///   fixed, so the ordinal is omitted.
///
/// New-record status is read from the tree at call time, never cached: a
/// node can transition from new to persisted between computations.
pub fn position(tree: &DocumentTree, node: NodeId) -> String {
    match tree.kind(node) {
        NodeKind::Root => String::new(),
        NodeKind::EmbedsOne => parent_joined(tree, node),
        NodeKind::EmbedsMany => {
            let base = parent_joined(tree, node);
            if tree.is_new(node) {
                return base;
            }
            match tree.ordinal(node) {
                Some(ordinal) => format!("{}{}{}", base, FIELD_SEPARATOR, ordinal),
                None => base,
            }
        }
    }
}

/// Computes the container path addressing `node` for `$unset`/`$pull` style
/// operations: the position with any trailing `.<digits>` group removed.
/// Identical to [`position`] for root and embeds-one nodes, and idempotent
/// when there is no ordinal to strip.
pub fn path(tree: &DocumentTree, node: NodeId) -> String {
    let position = position(tree, node);
    match tree.kind(node) {
        NodeKind::EmbedsMany => TRAILING_ORDINAL.replace(&position, "").into_owned(),
        _ => position,
    }
}

/// Returns the operator used to atomically insert `node` into its parent's
/// stored representation.
///
/// # Errors
///
/// Root nodes have no insert modifier; requesting one reports
/// [`ErrorKind::InvalidPath`], which usually means a referenced association
/// was mistakenly treated as embedded.
pub fn insert_modifier(tree: &DocumentTree, node: NodeId) -> DocumapResult<&'static str> {
    match tree.kind(node) {
        NodeKind::Root => Err(invalid_root_path("insert")),
        NodeKind::EmbedsOne => Ok(OP_SET),
        NodeKind::EmbedsMany => Ok(OP_PUSH),
    }
}

/// Returns the operator used to atomically delete `node` from its parent's
/// stored representation.
///
/// # Errors
///
/// Root nodes have no delete modifier; see [`insert_modifier`].
pub fn delete_modifier(tree: &DocumentTree, node: NodeId) -> DocumapResult<&'static str> {
    match tree.kind(node) {
        NodeKind::Root => Err(invalid_root_path("delete")),
        NodeKind::EmbedsOne => Ok(OP_UNSET),
        NodeKind::EmbedsMany => Ok(OP_PULL),
    }
}

/// Computes the position of an association's container field without a
/// concrete element instance. Used to persist an empty embedded collection
/// field, where no element exists to resolve a position from.
pub fn container_position(parent_position: &str, field: &str) -> String {
    join(parent_position, field)
}

fn parent_joined(tree: &DocumentTree, node: NodeId) -> String {
    // non-root invariant: parent and field are always present
    let parent_position = match tree.parent(node) {
        Some(parent) => position(tree, parent),
        None => String::new(),
    };
    let field = tree.field(node).unwrap_or_default();
    join(&parent_position, field)
}

fn join(parent_position: &str, field: &str) -> String {
    if parent_position.is_empty() {
        field.to_string()
    } else {
        format!("{}{}{}", parent_position, FIELD_SEPARATOR, field)
    }
}

fn invalid_root_path(operation: &str) -> DocumapError {
    log::error!(
        "Cannot compute {} modifier for a root document; a referenced \
         association may have been treated as embedded",
        operation
    );
    DocumapError::new(
        &format!(
            "Cannot compute {} modifier for a root document; a referenced \
             association may have been treated as embedded",
            operation
        ),
        ErrorKind::InvalidPath,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn tree_with_persisted_address() -> (DocumentTree, NodeId) {
        let mut tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        let address = tree
            .hydrated_embeds_many(root, "addresses", 0, doc! { "street": "A" })
            .unwrap();
        (tree, address)
    }

    #[test]
    fn root_path_and_position_are_empty() {
        let tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        assert_eq!(position(&tree, root), "");
        assert_eq!(path(&tree, root), "");
    }

    #[test]
    fn embeds_one_position_is_the_field_name() {
        let mut tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        let name = tree.hydrated_embeds_one(root, "name", doc! {}).unwrap();
        assert_eq!(position(&tree, name), "name");
        assert_eq!(path(&tree, name), "name");
    }

    #[test]
    fn persisted_embeds_many_position_carries_ordinal() {
        let (tree, address) = tree_with_persisted_address();
        assert_eq!(position(&tree, address), "addresses.0");
        assert_eq!(path(&tree, address), "addresses");
    }

    #[test]
    fn new_embeds_many_position_omits_ordinal() {
        let mut tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        let address = tree.add_embeds_many(root, "addresses", doc! {}).unwrap();
        assert_eq!(position(&tree, address), "addresses");
        assert_eq!(path(&tree, address), "addresses");
    }

    #[test]
    fn position_reflects_persistence_transition() {
        let mut tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        let address = tree.add_embeds_many(root, "addresses", doc! {}).unwrap();
        assert_eq!(position(&tree, address), "addresses");

        tree.mark_persisted(address, Some(3)).unwrap();
        assert_eq!(position(&tree, address), "addresses.3");
    }

    #[test]
    fn nested_positions_chain_through_ancestors() {
        let mut tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        let address = tree
            .hydrated_embeds_many(root, "addresses", 1, doc! {})
            .unwrap();
        let location = tree
            .hydrated_embeds_one(address, "location", doc! {})
            .unwrap();
        let phone = tree
            .hydrated_embeds_many(location, "phones", 2, doc! {})
            .unwrap();

        assert_eq!(position(&tree, location), "addresses.1.location");
        assert_eq!(position(&tree, phone), "addresses.1.location.phones.2");
        assert_eq!(path(&tree, phone), "addresses.1.location.phones");
    }

    #[test]
    fn stripping_only_touches_the_trailing_ordinal() {
        let mut tree = DocumentTree::hydrated(doc! {});
        let root = tree.root();
        // field name containing digits must survive stripping
        let child = tree
            .hydrated_embeds_many(root, "line2items", 4, doc! {})
            .unwrap();
        assert_eq!(position(&tree, child), "line2items.4");
        assert_eq!(path(&tree, child), "line2items");
    }

    #[test]
    fn path_equals_stripped_position_for_all_embeds_many() {
        let (tree, persisted) = tree_with_persisted_address();
        let mut tree = tree;
        let root = tree.root();
        let fresh = tree.add_embeds_many(root, "addresses", doc! {}).unwrap();

        for node in [persisted, fresh] {
            let stripped = TRAILING_ORDINAL
                .replace(&position(&tree, node), "")
                .into_owned();
            assert_eq!(path(&tree, node), stripped);
        }
    }

    #[test]
    fn insert_modifier_per_node_kind() {
        let (mut tree, address) = tree_with_persisted_address();
        let root = tree.root();
        let name = tree.hydrated_embeds_one(root, "name", doc! {}).unwrap();

        assert_eq!(insert_modifier(&tree, name).unwrap(), OP_SET);
        assert_eq!(insert_modifier(&tree, address).unwrap(), OP_PUSH);

        let error = insert_modifier(&tree, root).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::InvalidPath);
    }

    #[test]
    fn delete_modifier_per_node_kind() {
        let (mut tree, address) = tree_with_persisted_address();
        let root = tree.root();
        let name = tree.hydrated_embeds_one(root, "name", doc! {}).unwrap();

        assert_eq!(delete_modifier(&tree, name).unwrap(), OP_UNSET);
        assert_eq!(delete_modifier(&tree, address).unwrap(), OP_PULL);
        assert!(delete_modifier(&tree, root).is_err());
    }

    #[test]
    fn container_position_joins_with_separator_only_when_needed() {
        assert_eq!(container_position("", "addresses"), "addresses");
        assert_eq!(
            container_position("addresses.0", "phones"),
            "addresses.0.phones"
        );
    }
}
